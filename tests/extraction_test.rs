//! Extractor-level properties: empty configurations, complement symmetry,
//! determinism, seamless welding, and the reference sphere scenario.

use cgmath::Vector3;
use isoterrain::{extract, Bounds, ExtractOptions};

fn bounds_for(dims: usize) -> Bounds {
    Bounds::cube(Vector3::new(0.0, 0.0, 0.0), (dims - 1) as f32)
}

/// Density field of a sphere: value = distance from center − radius.
fn sphere_field(dims: usize, center: [f32; 3], radius: f32) -> Vec<f32> {
    let mut field = Vec::with_capacity(dims * dims * dims);
    for z in 0..dims {
        for y in 0..dims {
            for x in 0..dims {
                let dx = x as f32 - center[0];
                let dy = y as f32 - center[1];
                let dz = z as f32 - center[2];
                field.push((dx * dx + dy * dy + dz * dz).sqrt() - radius);
            }
        }
    }
    field
}

fn no_boundary() -> ExtractOptions {
    ExtractOptions {
        close_boundary: false,
        ..ExtractOptions::default()
    }
}

#[test]
fn constant_field_below_iso_emits_nothing() {
    let field = vec![-2.0f32; 6 * 6 * 6];
    let mesh = extract(&field, [6, 6, 6], 0.0, bounds_for(6), &no_boundary());
    assert_eq!(mesh.triangle_count(), 0);
    assert_eq!(mesh.vertex_count(), 0);
}

#[test]
fn constant_field_above_iso_emits_nothing() {
    let field = vec![2.0f32; 6 * 6 * 6];
    let mesh = extract(&field, [6, 6, 6], 0.0, bounds_for(6), &no_boundary());
    assert_eq!(mesh.triangle_count(), 0);
}

#[test]
fn boundary_closure_extends_surface_past_field_edge() {
    // A sphere larger than the field exits through every face. The margin
    // cells carry the surface one cell further instead of clipping it at
    // the field edge, so the closed pass emits strictly more geometry.
    let field = sphere_field(6, [2.5, 2.5, 2.5], 3.0);
    let open = extract(&field, [6, 6, 6], 0.0, bounds_for(6), &no_boundary());
    let closed = extract(
        &field,
        [6, 6, 6],
        0.0,
        bounds_for(6),
        &ExtractOptions::default(),
    );
    assert!(open.triangle_count() > 0);
    assert!(closed.triangle_count() > open.triangle_count());
}

#[test]
fn negated_field_produces_equal_triangle_counts() {
    // A configuration and its bitwise complement reference the same edge
    // set, so flipping the field inside/outside preserves triangle count.
    let mut rng = fastrand::Rng::with_seed(0x5eed);
    let field: Vec<f32> = (0..8 * 8 * 8).map(|_| rng.f32() * 2.0 - 1.0).collect();
    let negated: Vec<f32> = field.iter().map(|v| -v).collect();

    let mesh = extract(&field, [8, 8, 8], 0.0, bounds_for(8), &no_boundary());
    let mesh_negated = extract(&negated, [8, 8, 8], 0.0, bounds_for(8), &no_boundary());

    assert!(mesh.triangle_count() > 0);
    assert_eq!(mesh.triangle_count(), mesh_negated.triangle_count());
}

#[test]
fn extraction_is_deterministic() {
    let field = sphere_field(8, [3.5, 3.5, 3.5], 2.5);
    let options = ExtractOptions::default();
    let first = extract(&field, [8, 8, 8], 0.0, bounds_for(8), &options);
    let second = extract(&field, [8, 8, 8], 0.0, bounds_for(8), &options);
    assert_eq!(first, second);
}

#[test]
fn extraction_does_not_mutate_the_field() {
    let field = sphere_field(8, [3.5, 3.5, 3.5], 2.5);
    let copy = field.clone();
    let _ = extract(&field, [8, 8, 8], 0.0, bounds_for(8), &ExtractOptions::default());
    assert_eq!(field, copy);
}

#[test]
fn sphere_scenario_produces_triangles() {
    // 4x4x4 chunk, spherical field of radius 1.5 centered at (2,2,2).
    let field = sphere_field(4, [2.0, 2.0, 2.0], 1.5);
    let mesh = extract(
        &field,
        [4, 4, 4],
        0.0,
        bounds_for(4),
        &ExtractOptions::default(),
    );
    assert!(mesh.vertex_count() > 0);
    assert!(mesh.indices.len() % 3 == 0);
    assert!(mesh.triangle_count() > 0);
    assert_eq!(mesh.positions.len(), mesh.normals.len());
}

#[test]
fn seamless_mode_welds_quantized_duplicates() {
    use std::collections::HashSet;

    let field = sphere_field(8, [3.5, 3.5, 3.5], 2.5);
    let mesh = extract(
        &field,
        [8, 8, 8],
        0.0,
        bounds_for(8),
        &ExtractOptions {
            seamless: true,
            double_sided: false,
            close_boundary: true,
        },
    );

    // No two distinct emitted vertices may share a quantized position.
    let mut seen = HashSet::new();
    for position in &mesh.positions {
        let key = (
            (position[0] * 1.0e4).round() as i64,
            (position[1] * 1.0e4).round() as i64,
            (position[2] * 1.0e4).round() as i64,
        );
        assert!(seen.insert(key), "duplicate welded position {position:?}");
    }

    // The non-seamless pass emits strictly more vertices for the same
    // geometry, since every table edge reference appends.
    let unwelded = extract(
        &field,
        [8, 8, 8],
        0.0,
        bounds_for(8),
        &ExtractOptions {
            seamless: false,
            double_sided: false,
            close_boundary: true,
        },
    );
    assert!(unwelded.vertex_count() > mesh.vertex_count());
    assert_eq!(unwelded.triangle_count(), mesh.triangle_count());
}

#[test]
fn double_sided_mode_doubles_triangles() {
    let field = sphere_field(6, [2.5, 2.5, 2.5], 1.8);
    let single = extract(&field, [6, 6, 6], 0.0, bounds_for(6), &no_boundary());
    let double = extract(
        &field,
        [6, 6, 6],
        0.0,
        bounds_for(6),
        &ExtractOptions {
            double_sided: true,
            close_boundary: false,
            ..ExtractOptions::default()
        },
    );
    assert_eq!(double.triangle_count(), single.triangle_count() * 2);

    // The mirrored triangle reverses winding, not geometry.
    assert_eq!(double.vertex_count(), single.vertex_count());
}

#[test]
fn nan_samples_never_break_extraction() {
    let mut field = sphere_field(6, [2.5, 2.5, 2.5], 1.8);
    field[0] = f32::NAN;
    field[100] = f32::NAN;
    let mesh = extract(&field, [6, 6, 6], 0.0, bounds_for(6), &ExtractOptions::default());
    for position in &mesh.positions {
        assert!(position.iter().all(|c| c.is_finite()));
    }
    for normal in &mesh.normals {
        assert!(normal.iter().all(|c| c.is_finite()));
    }
}

#[test]
fn normals_are_unit_length() {
    let field = sphere_field(8, [3.5, 3.5, 3.5], 2.5);
    let mesh = extract(&field, [8, 8, 8], 0.0, bounds_for(8), &ExtractOptions::default());
    assert!(mesh.vertex_count() > 0);
    for normal in &mesh.normals {
        let length = (normal[0] * normal[0] + normal[1] * normal[1] + normal[2] * normal[2]).sqrt();
        assert!((length - 1.0).abs() < 1.0e-3, "normal {normal:?} not unit");
    }
}
