//! End-to-end decoding of in-memory FBX documents.

mod common;

use common::*;
use glam::Vec3;
use kaydara_io::{
    decode, read, Geometry, ImageSource, LightType, NodeKind, Projection, ReadOptions, TrackValues,
    UnifiedScene, Wrap,
};
use proptest::prelude::*;

fn decode_ok(data: &[u8]) -> UnifiedScene {
    decode(data, &ReadOptions::default()).unwrap()
}

fn model(id: i64, name: &str, type_name: &str) -> Record {
    object("Model", id, "Model", name, type_name)
}

fn translated_model(id: i64, name: &str, type_name: &str, t: [f64; 3]) -> Record {
    model(id, name, type_name).with(props(vec![p("Lcl Translation", "Lcl Translation", &t)]))
}

fn first_root(scene: &UnifiedScene) -> usize {
    scene.roots[0]
}

#[test]
fn test_scenario_a_binary_quad() {
    let doc = Document::new(
        7500,
        vec![model(1000, "Quad", "Mesh"), quad_geometry(4000)],
        vec![connect(1000, 0), connect(4000, 1000)],
    );
    let scene = decode_ok(&doc.to_binary(false));

    let root = &scene.nodes[first_root(&scene)];
    assert_eq!(root.children.len(), 1);
    let mesh_node = &scene.nodes[root.children[0]];
    assert!(mesh_node.is_mesh());

    let mesh = scene.geometries[mesh_node.geometry.unwrap()].as_mesh().unwrap();
    assert_eq!(mesh.triangle_count(), 2);
    assert_eq!(mesh.vertex_count(), 6);

    let v0 = Vec3::ZERO;
    let v2 = Vec3::new(1.0, 1.0, 0.0);
    assert_eq!(mesh.positions.iter().filter(|p| **p == v0).count(), 2);
    assert_eq!(mesh.positions.iter().filter(|p| **p == v2).count(), 2);
    assert_eq!(mesh.positions[0], v0);
    assert_eq!(mesh.positions[3], v0);
    assert_eq!(mesh.positions[2], v2);
    assert_eq!(mesh.positions[4], v2);
}

#[test]
fn test_scenario_b_material_opacity() {
    let material = object("Material", 2000, "Material", "Glass", "")
        .with(props(vec![p("Opacity", "Number", &[0.5])]));
    let doc = Document::new(
        7400,
        vec![model(1000, "Quad", "Mesh"), quad_geometry(4000), material],
        vec![connect(1000, 0), connect(4000, 1000), connect(2000, 1000)],
    );

    for data in [doc.to_binary(false), doc.to_ascii().into_bytes()] {
        let scene = decode_ok(&data);
        let node = scene.find_node("Quad").unwrap();
        let material = &scene.materials[scene.nodes[node].materials[0]];
        assert_eq!(material.name, "Glass");
        assert_eq!(material.opacity, 0.5);
        assert!(material.transparent);
    }
}

#[test]
fn test_scenario_c_texture_wrap() {
    let texture = object("Texture", 3000, "Texture", "Checker", "")
        .with(props(vec![p("WrapModeU", "enum", &[1.0])]))
        .with(leaf("FileName", s("textures/checker.png")));
    let doc = Document::new(7400, vec![texture], Vec::new());

    let scene = decode_ok(&doc.to_binary(true));
    assert_eq!(scene.textures.len(), 1);
    let texture = &scene.textures[0];
    assert_eq!(texture.sampler.wrap_u, Wrap::ClampToEdge);
    assert_eq!(texture.sampler.wrap_v, Wrap::Repeat);
    match &texture.source {
        ImageSource::External { uri } => assert_eq!(uri, "checker.png"),
        other => panic!("Expected external image, got {:?}", other),
    }
}

#[test]
fn test_scenario_d_single_axis_curve() {
    let doc = Document::new(
        7500,
        vec![
            translated_model(1000, "Box", "Null", [0.0, 5.0, 7.0]),
            object("AnimationStack", 10, "AnimStack", "Take 001", ""),
            object("AnimationLayer", 11, "AnimLayer", "BaseLayer", ""),
            object("AnimationCurveNode", 20, "AnimCurveNode", "T", ""),
            curve(30, &[0, 1, 2], &[1.5, -2.0, 4.25]),
        ],
        vec![
            connect(1000, 0),
            connect(11, 10),
            connect(20, 11),
            connect_property(20, 1000, "Lcl Translation"),
            connect_property(30, 20, "d|X"),
        ],
    );
    let scene = decode_ok(&doc.to_binary(false));

    let clip = scene.find_clip("Take 001").unwrap();
    let track = clip.track("Box.position").unwrap();
    assert_eq!(track.times, vec![0.0, 1.0, 2.0]);
    match &track.values {
        TrackValues::Vectors(values) => {
            assert_eq!(values.len(), 3);
            let xs: Vec<f32> = values.iter().map(|v| v.x).collect();
            assert_eq!(xs, vec![1.5, -2.0, 4.25]);
            for v in values {
                assert!((v.y - 5.0).abs() < 1e-5);
                assert!((v.z - 7.0).abs() < 1e-5);
                assert_eq!(v.y, values[0].y);
                assert_eq!(v.z, values[0].z);
            }
        }
        other => panic!("Expected vector values, got {:?}", other),
    }
}

/// A rigged, morphed, animated mesh with a camera and a light.
fn character() -> Document {
    let mut identity_with_offset = vec![0.0; 16];
    for i in [0, 5, 10, 15] {
        identity_with_offset[i] = 1.0;
    }
    identity_with_offset[13] = 2.0;

    let objects = vec![
        translated_model(3000, "Rig", "Null", [0.0, 5.0, 7.0]),
        model(3001, "Body", "Mesh"),
        model(3002, "Hip", "LimbNode"),
        model(3003, "Eye", "Camera"),
        model(3004, "Lamp", "Light"),
        quad_geometry(4001),
        object("Geometry", 4002, "Geometry", "Smile", "Shape")
            .with(ints("Indexes", &[2]))
            .with(floats("Vertices", &[0.0, 0.0, 1.0])),
        object("Material", 2000, "Material", "Skin", "")
            .with(props(vec![p("DiffuseColor", "Color", &[1.0, 1.0, 1.0])])),
        object("Deformer", 700, "Deformer", "Skin", "Skin"),
        object("Deformer", 701, "SubDeformer", "Hip", "Cluster")
            .with(ints("Indexes", &[0, 1, 2, 3]))
            .with(floats("Weights", &[0.5, 0.5, 0.5, 0.5]))
            .with(floats("TransformLink", &identity_with_offset)),
        object("Deformer", 800, "Deformer", "Shapes", "BlendShape"),
        object("Deformer", 801, "SubDeformer", "Smile", "BlendShapeChannel"),
        object("NodeAttribute", 5000, "NodeAttribute", "Eye", "Camera").with(props(vec![
            p("AspectWidth", "double", &[400.0]),
            p("AspectHeight", "double", &[200.0]),
            p("FieldOfView", "double", &[60.0]),
        ])),
        object("NodeAttribute", 5001, "NodeAttribute", "Lamp", "Light").with(props(vec![
            p("LightType", "enum", &[1.0]),
            p("Intensity", "Number", &[250.0]),
        ])),
        object("AnimationStack", 10, "AnimStack", "Walk", ""),
        object("AnimationLayer", 11, "AnimLayer", "BaseLayer", ""),
        object("AnimationCurveNode", 20, "AnimCurveNode", "T", ""),
        object("AnimationCurveNode", 40, "AnimCurveNode", "DeformPercent", ""),
        curve(30, &[0, 1, 2], &[1.0, 2.0, 3.0]),
        curve(41, &[0, 1, 2], &[0.0, 50.0, 100.0]),
    ];

    let connections = vec![
        connect(3000, 0),
        connect(3001, 3000),
        connect(3002, 3000),
        connect(3003, 0),
        connect(3004, 0),
        connect(4001, 3001),
        connect(2000, 3001),
        connect(700, 4001),
        connect(701, 700),
        connect(3002, 701),
        connect(800, 4001),
        connect(801, 800),
        connect(4002, 801),
        connect(5000, 3003),
        connect(5001, 3004),
        connect(11, 10),
        connect(20, 11),
        connect(40, 11),
        connect_property(20, 3000, "Lcl Translation"),
        connect_property(30, 20, "d|X"),
        connect_property(40, 801, "DeformPercent"),
        connect_property(41, 40, "d|DeformPercent"),
    ];

    let settings = Record::new("GlobalSettings", Vec::new()).with(props(vec![
        p("UpAxis", "int", &[1.0]),
        p("UnitScaleFactor", "double", &[1.0]),
        p("TimeMode", "enum", &[11.0]),
    ]));

    Document::new(7400, objects, connections).with_section(settings)
}

/// JSON view of a scene without the fields that name the source variant.
fn comparable(mut scene: UnifiedScene) -> serde_json::Value {
    scene.metadata.source_format = None;
    scene.metadata.version = None;
    serde_json::to_value(&scene).unwrap()
}

#[test]
fn test_ascii_and_binary_trees_agree() {
    let doc = character();
    let text = kaydara_parser::parse(doc.to_ascii().as_bytes()).unwrap();
    let plain = kaydara_parser::parse(&doc.to_binary(false)).unwrap();
    let compressed = kaydara_parser::parse(&doc.to_binary(true)).unwrap();

    for binary in [&plain, &compressed] {
        assert_eq!(binary.version, text.version);
        assert_eq!(binary.node_names(), text.node_names());
        for kind in ["Model", "Geometry", "Deformer", "NodeAttribute", "AnimationCurve"] {
            let ids = |tree: &kaydara_core::FbxTree| -> Vec<Option<i64>> {
                tree.objects_of(kind).map(|n| n.numeric_id()).collect()
            };
            assert_eq!(ids(binary), ids(&text), "{} ids differ", kind);

            for (a, b) in binary.objects_of(kind).zip(text.objects_of(kind)) {
                assert_eq!(a.attr_name, b.attr_name);
                assert_eq!(a.properties.get(1), b.properties.get(1));
                assert_eq!(a.attr_type, b.attr_type);
                assert_eq!(a.attributes, b.attributes);
                assert_eq!(a.array_f64("Vertices"), b.array_f64("Vertices"));
                assert_eq!(a.array_i64("KeyTime"), b.array_i64("KeyTime"));
            }
        }
    }
}

#[test]
fn test_ascii_and_binary_scenes_agree() {
    let doc = character();
    let text = comparable(decode_ok(doc.to_ascii().as_bytes()));
    assert_eq!(comparable(decode_ok(&doc.to_binary(false))), text);
    assert_eq!(
        comparable(decode_ok(&Document { version: 7500, ..doc }.to_binary(true))),
        text
    );
}

#[test]
fn test_skinned_mesh() {
    let scene = read(&character().to_binary(false), &ReadOptions::default()).unwrap();
    let body = scene.find_node("Body").unwrap();
    let hip = scene.find_node("Hip").unwrap();
    assert!(scene.nodes[hip].is_bone());

    let skin = &scene.skins[scene.nodes[body].skin.unwrap()];
    assert_eq!(skin.bones, vec![Some(hip)]);
    assert!(skin.inverse_bind_matrices[0]
        .w_axis
        .truncate()
        .abs_diff_eq(Vec3::new(0.0, -2.0, 0.0), 1e-6));

    let mesh = scene.geometries[scene.nodes[body].geometry.unwrap()].as_mesh().unwrap();
    let indices = mesh.skin_indices.as_ref().unwrap();
    let weights = mesh.skin_weights.as_ref().unwrap();
    assert_eq!(weights.len(), mesh.vertex_count());
    assert!(indices.iter().all(|i| i[0] == 0));
    assert!(weights.iter().all(|w| (w[0] - 1.0).abs() < 1e-6));
}

#[test]
fn test_morph_target_and_weight_track() {
    let scene = decode_ok(character().to_ascii().as_bytes());
    let body = scene.find_node("Body").unwrap();
    let mesh = scene.geometries[scene.nodes[body].geometry.unwrap()].as_mesh().unwrap();

    assert_eq!(mesh.morph_targets.len(), 1);
    let target = &mesh.morph_targets[0];
    assert_eq!(target.name, "Smile");
    assert_eq!(target.positions[2], Vec3::new(1.0, 1.0, 1.0));
    assert_eq!(target.positions[4], Vec3::new(1.0, 1.0, 1.0));
    assert_eq!(target.positions[1], mesh.positions[1]);

    let material = &scene.materials[scene.nodes[body].materials[0]];
    assert!(material.morph_targets);

    let clip = scene.find_clip("Walk").unwrap();
    let track = clip.track("Body.morphTargetInfluences[0]").unwrap();
    assert_eq!(track.values, TrackValues::Scalars(vec![0.0, 0.5, 1.0]));
}

#[test]
fn test_camera_and_light() {
    let scene = decode_ok(&character().to_binary(false));

    let eye = scene.find_node("Eye").unwrap();
    match &scene.nodes[eye].kind {
        NodeKind::Camera(camera) => {
            assert_eq!(camera.near, 1.0);
            assert_eq!(camera.far, 1000.0);
            assert_eq!(
                camera.projection,
                Projection::Perspective { fov: 60.0, aspect: 2.0 }
            );
        }
        other => panic!("Expected camera, got {:?}", other),
    }

    let lamp = scene.find_node("Lamp").unwrap();
    match &scene.nodes[lamp].kind {
        NodeKind::Light(light) => {
            assert_eq!(light.light_type, LightType::Directional);
            assert_eq!(light.intensity, 2.5);
            assert_eq!(light.color, Vec3::ONE);
        }
        other => panic!("Expected light, got {:?}", other),
    }
}

#[test]
fn test_animation_clip() {
    let scene = decode_ok(&character().to_binary(true));
    assert_eq!(scene.animations.len(), 1);
    let clip = &scene.animations[0];
    assert_eq!(clip.name, "Walk");
    assert_eq!(clip.duration, 2.0);
    assert_eq!(clip.tracks.len(), 2);

    let track = clip.track("Rig.position").unwrap();
    assert_eq!(track.node, scene.find_node("Rig").unwrap());
    match &track.values {
        TrackValues::Vectors(values) => {
            assert!(values[2].abs_diff_eq(Vec3::new(3.0, 5.0, 7.0), 1e-5));
        }
        other => panic!("Expected vector values, got {:?}", other),
    }
    assert_eq!(scene.metadata.frame_rate, Some(24.0));
}

#[test]
fn test_scene_hierarchy() {
    let scene = decode_ok(character().to_ascii().as_bytes());
    let root = &scene.nodes[first_root(&scene)];
    assert_eq!(root.name, "");
    assert_eq!(root.children.len(), 3);

    let rig = scene.find_node("Rig").unwrap();
    let body = scene.find_node("Body").unwrap();
    assert_eq!(scene.nodes[body].parent, Some(rig));
    assert!(scene.nodes[body]
        .world_transform
        .w_axis
        .truncate()
        .abs_diff_eq(Vec3::new(0.0, 5.0, 7.0), 1e-5));
}

#[test]
fn test_truncated_binary_is_an_error() {
    let data = character().to_binary(false);
    assert!(decode(&data[..data.len() / 2], &ReadOptions::default()).is_err());
}

/// Polygon index list for faces of the given sizes over 8 vertices.
fn polygons(sizes: &[usize]) -> Vec<i32> {
    let mut indices = Vec::new();
    let mut next = 0i32;
    for &size in sizes {
        for corner in 0..size {
            let index = next % 8;
            next += 1;
            indices.push(if corner + 1 == size { -index - 1 } else { index });
        }
    }
    indices
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_fan_triangulation_count(sizes in prop::collection::vec(3usize..8, 1..12)) {
        let vertices: Vec<f64> = (0..8).flat_map(|i| [i as f64, (i * i) as f64, 0.0]).collect();
        let geometry = mesh_geometry(4000, "Poly", &vertices, &polygons(&sizes));
        let doc = Document::new(
            7400,
            vec![model(1000, "Poly", "Mesh"), geometry],
            vec![connect(1000, 0), connect(4000, 1000)],
        );
        let scene = decode_ok(doc.to_ascii().as_bytes());
        let expected: usize = sizes.iter().map(|n| n - 2).sum();

        match &scene.geometries[0] {
            Geometry::Mesh(mesh) => {
                prop_assert_eq!(mesh.triangle_count(), expected);
                prop_assert_eq!(mesh.vertex_count(), expected * 3);
            }
            other => prop_assert!(false, "Expected mesh, got {:?}", other),
        }
    }
}
