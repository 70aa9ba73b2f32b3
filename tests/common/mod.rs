#![allow(dead_code)]

/// Header text plus raw body bytes.
pub fn ply(format: &str, header: &[&str], body: &[u8]) -> Vec<u8> {
    let mut out = format!("ply\nformat {format} 1.0\n");
    for line in header {
        out.push_str(line);
        out.push('\n');
    }
    out.push_str("end_header\n");
    let mut bytes = out.into_bytes();
    bytes.extend_from_slice(body);
    bytes
}

pub fn le_f32(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Little-endian splat file: position, DC color, `rest` higher-order
/// coefficients, opacity, scale and rotation, all `float`.
///
/// Every point gets zero DC, opacity and log scale, identity rotation and
/// `f_rest_k = k`.
pub fn splat_file(points: &[[f32; 3]], rest: usize) -> Vec<u8> {
    let mut header = vec![
        format!("element vertex {}", points.len()),
        "property float x".to_string(),
        "property float y".to_string(),
        "property float z".to_string(),
    ];
    for i in 0..3 {
        header.push(format!("property float f_dc_{i}"));
    }
    for i in 0..rest {
        header.push(format!("property float f_rest_{i}"));
    }
    header.push("property float opacity".to_string());
    for i in 0..3 {
        header.push(format!("property float scale_{i}"));
    }
    for i in 0..4 {
        header.push(format!("property float rot_{i}"));
    }

    let mut body = Vec::new();
    for p in points {
        body.extend(le_f32(p));
        body.extend(le_f32(&[0.0; 3]));
        let coeffs: Vec<f32> = (0..rest).map(|k| k as f32).collect();
        body.extend(le_f32(&coeffs));
        body.extend(le_f32(&[0.0]));
        body.extend(le_f32(&[0.0; 3]));
        body.extend(le_f32(&[1.0, 0.0, 0.0, 0.0]));
    }

    let lines: Vec<&str> = header.iter().map(String::as_str).collect();
    ply("binary_little_endian", &lines, &body)
}
