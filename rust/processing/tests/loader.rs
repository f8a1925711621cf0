// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! End-to-end load pipeline tests.

use async_trait::async_trait;
use cadlite_core::{
    FormatTag, GeometryKernel, ImportedMesh, KernelArray, KernelIndices, KernelMesh, KernelOutput,
    MeshImporter, SceneNode,
};
use cadlite_geometry::IDENTITY;
use cadlite_processing::{
    ContentCache, InputFile, LoadError, Loader, LoaderConfig, MaterialLibrary, NoProgress, ProgressEvent, Stage,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

const ASCII_STL: &str = "solid t facet normal 0 0 1 outer loop vertex 0 0 0 vertex 1 0 0 vertex 0 1 0 endloop endfacet endsolid";

fn binary_stl(triangles: u32) -> Vec<u8> {
    let mut bytes = vec![0u8; 80];
    bytes.extend_from_slice(&triangles.to_le_bytes());
    for t in 0..triangles {
        let z = t as f32;
        let floats = [0.0, 0.0, 1.0, 0.0, 0.0, z, 1.0, 0.0, z, 0.0, 1.0, z];
        for f in floats {
            bytes.extend_from_slice(&f32::to_le_bytes(f));
        }
        bytes.extend_from_slice(&[0, 0]);
    }
    bytes
}

fn loader(config: LoaderConfig) -> Loader {
    let cache = Arc::new(ContentCache::in_memory(config.memory_capacity));
    Loader::new(config, cache, Arc::new(MaterialLibrary::new()))
}

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<ProgressEvent>>,
}

impl Recorder {
    fn sink(&self) -> impl Fn(ProgressEvent) + Send + Sync + '_ {
        move |event| self.events.lock().unwrap().push(event)
    }

    fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().unwrap().clone()
    }
}

fn assert_well_ordered(events: &[ProgressEvent]) {
    assert!(!events.is_empty());
    for pair in events.windows(2) {
        assert!(pair[0].progress <= pair[1].progress, "{:?}", events);
    }
    let terminal = events
        .iter()
        .position(|e| matches!(e.stage, Stage::Complete | Stage::Error))
        .expect("terminal event");
    assert_eq!(terminal, events.len() - 1);
}

struct CountingKernel {
    calls: AtomicUsize,
    output: KernelOutput,
}

impl CountingKernel {
    fn new(output: KernelOutput) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            output,
        }
    }

    fn cube_face() -> KernelOutput {
        KernelOutput {
            success: true,
            meshes: vec![KernelMesh {
                name: Some("Face".into()),
                positions: KernelArray::Nested(vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0]]),
                normals: None,
                indices: KernelIndices::Nested(vec![[0, 1, 2], [0, 2, 3]]),
                color: Some([255.0, 0.0, 0.0]),
            }],
            error: None,
        }
    }
}

#[async_trait]
impl GeometryKernel for CountingKernel {
    async fn tessellate(&self, _bytes: &[u8]) -> cadlite_core::Result<KernelOutput> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.output.clone())
    }
}

#[tokio::test]
async fn ascii_stl_scenario() {
    let loader = loader(LoaderConfig::default());
    let recorder = Recorder::default();
    let assembly = loader
        .load_bytes("t.stl", ASCII_STL.as_bytes().to_vec(), &recorder.sink())
        .await
        .unwrap();

    assert_eq!(assembly.parts.len(), 1);
    assert_eq!(assembly.geometries.len(), 1);
    let geometry = assembly.geometries.values().next().unwrap();
    assert_eq!(geometry.triangle_count, 1);
    assert_eq!(geometry.normals, vec![0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0]);

    let events = recorder.events();
    assert_well_ordered(&events);
    assert_eq!(events.last().unwrap().progress, 100);
    assert!(events.iter().any(|e| e.stage == Stage::Optimizing));
}

#[tokio::test]
async fn binary_stl_triangle_count_matches_length() {
    let loader = loader(LoaderConfig::default());
    let bytes = binary_stl(7);
    let expected = (bytes.len() - 84) / 50;
    let assembly = loader.load_bytes("part.stl", bytes, &NoProgress).await.unwrap();
    assert_eq!(assembly.total_triangles, expected);
    assert_eq!(assembly.format, FormatTag::Stl);
}

#[tokio::test]
async fn obj_square_fan() {
    let loader = loader(LoaderConfig::default());
    let obj = "v 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\nf 1 2 3 4\n";
    let assembly = loader.load_bytes("square.obj", obj.as_bytes().to_vec(), &NoProgress).await.unwrap();
    assert_eq!(assembly.total_triangles, 2);
    let geometry = assembly.geometries.values().next().unwrap();
    let mut corners: Vec<[u32; 3]> = geometry
        .indices
        .iter()
        .map(|&i| {
            let p = &geometry.positions[i as usize * 3..i as usize * 3 + 3];
            [p[0] as u32, p[1] as u32, p[2] as u32]
        })
        .collect();
    corners.sort();
    corners.dedup();
    assert_eq!(corners.len(), 4);
}

#[tokio::test]
async fn material_then_obj_gets_color() {
    let loader = loader(LoaderConfig::default());
    let mtl = "newmtl Red\nKd 1 0 0\n";
    let placeholder = loader.load_bytes("foo.mtl", mtl.as_bytes().to_vec(), &NoProgress).await.unwrap();
    assert!(placeholder.material_only);
    assert!(placeholder.parts.is_empty());
    assert_eq!(loader.materials().names(), vec!["foo"]);
    assert_eq!(loader.cache().stats().memory_entries, 0);

    let obj = "mtllib foo.mtl\nv 0 0 0\nv 1 0 0\nv 0 1 0\nusemtl Red\nf 1 2 3\n";
    let assembly = loader.load_bytes("foo.obj", obj.as_bytes().to_vec(), &NoProgress).await.unwrap();
    assert_eq!(assembly.parts[0].color(), Some([1.0, 0.0, 0.0]));
}

#[tokio::test]
async fn load_many_loads_materials_first() {
    let loader = loader(LoaderConfig::default());
    let files = vec![
        InputFile::new(
            "models/bar.obj",
            b"v 0 0 0\nv 1 0 0\nv 0 1 0\nusemtl Green\nf 1 2 3\n".to_vec(),
        ),
        InputFile::new("bar.mtl", b"newmtl Green\nKd 0 1 0\n".to_vec()),
    ];
    let recorder = Recorder::default();
    let assembly = loader.load_many(files, &recorder.sink()).await.unwrap();
    assert_eq!(assembly.parts[0].color(), Some([0.0, 1.0, 0.0]));
    assert_well_ordered(&recorder.events());
}

#[tokio::test]
async fn load_many_without_model_is_unsupported() {
    let loader = loader(LoaderConfig::default());
    let files = vec![InputFile::new("only.mtl", b"newmtl A\n".to_vec())];
    let err = loader.load_many(files, &NoProgress).await.unwrap_err();
    assert!(matches!(err, LoadError::UnsupportedFormat { .. }));
    assert_eq!(loader.materials().names(), vec!["only"]);
}

#[tokio::test]
async fn oversized_input_fails_before_parsing() {
    let kernel = Arc::new(CountingKernel::new(CountingKernel::cube_face()));
    let loader = loader(LoaderConfig::default().with_max_input_bytes(64)).with_kernel(kernel.clone());
    let recorder = Recorder::default();

    let bytes = b"ISO-10303-21;\nHEADER;\n".repeat(10);
    let err = loader.load_bytes("big.step", bytes, &recorder.sink()).await.unwrap_err();

    match &err {
        LoadError::SizeExceeded { actual_mb, max_mb } => assert!(actual_mb > max_mb),
        other => panic!("unexpected error {:?}", other),
    }
    assert!(err.to_string().contains("MB"));
    assert_eq!(kernel.calls.load(Ordering::SeqCst), 0);
    assert_eq!(loader.cache().stats().memory_entries, 0);

    let events = recorder.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].stage, Stage::Error);
}

#[tokio::test]
async fn cache_hit_short_circuits() {
    let kernel = Arc::new(CountingKernel::new(CountingKernel::cube_face()));
    let loader = loader(LoaderConfig::default()).with_kernel(kernel.clone());
    let bytes = b"ISO-10303-21;\nHEADER;\nENDSEC;\n".to_vec();

    let first = loader.load_bytes("face.step", bytes.clone(), &NoProgress).await.unwrap();
    let recorder = Recorder::default();
    let second = loader.load_bytes("copy.stp", bytes, &recorder.sink()).await.unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(kernel.calls.load(Ordering::SeqCst), 1);
    assert_eq!(first.parts[0].color(), Some([1.0, 0.0, 0.0]));
    assert_eq!(first.total_triangles, 2);

    let events = recorder.events();
    assert_well_ordered(&events);
    assert!(events.iter().all(|e| e.stage != Stage::Parsing));
    assert_eq!(events.last().unwrap().stage, Stage::Complete);
}

#[tokio::test]
async fn durable_hit_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let config = LoaderConfig::default().with_cache_dir(dir.path());
    let bytes = binary_stl(3);

    let original = {
        let cache = Arc::new(ContentCache::open(&config).await);
        let loader = Loader::new(config.clone(), cache, Arc::new(MaterialLibrary::new()));
        loader.load_bytes("part.stl", bytes.clone(), &NoProgress).await.unwrap()
    };

    let cache = Arc::new(ContentCache::open(&config).await);
    assert_eq!(cache.stats().durable_entries, 1);
    assert_eq!(cache.stats().memory_entries, 0);

    // Same content under a name that cannot be parsed proves it came from cache
    let loader = Loader::new(config, cache.clone(), Arc::new(MaterialLibrary::new()));
    let restored = loader.load_bytes("renamed.gltf", bytes, &NoProgress).await.unwrap();

    assert_eq!(restored.parts, original.parts);
    assert_eq!(restored.geometries, original.geometries);
    assert!(cache.contains_in_memory(&original.id));
}

#[tokio::test]
async fn unsupported_formats_carry_recommendation() {
    let loader = loader(LoaderConfig::default());

    let err = loader.load_bytes("scene.gltf", b"{\"asset\":{}}".to_vec(), &NoProgress).await.unwrap_err();
    match err {
        LoadError::UnsupportedFormat { format, recommendation } => {
            assert_eq!(format, "gltf");
            assert!(!recommendation.is_empty());
        }
        other => panic!("unexpected error {:?}", other),
    }

    // No kernel configured
    let err = loader.load_bytes("part.step", b"ISO-10303-21;".to_vec(), &NoProgress).await.unwrap_err();
    assert!(matches!(err, LoadError::UnsupportedFormat { .. }));

    let err = loader.load_bytes("scene.max", vec![1, 2, 3], &NoProgress).await.unwrap_err();
    assert!(err.to_string().contains(".3ds"));
}

#[tokio::test]
async fn kernel_failure_is_malformed_and_not_cached() {
    let kernel = Arc::new(CountingKernel::new(KernelOutput {
        success: false,
        meshes: Vec::new(),
        error: Some("bad header".into()),
    }));
    let loader = loader(LoaderConfig::default()).with_kernel(kernel);
    let recorder = Recorder::default();
    let err = loader
        .load_bytes("broken.step", b"ISO-10303-21;".to_vec(), &recorder.sink())
        .await
        .unwrap_err();

    assert!(matches!(err, LoadError::MalformedInput(ref m) if m.contains("bad header")));
    assert_eq!(loader.cache().stats().memory_entries, 0);
    let events = recorder.events();
    assert_well_ordered(&events);
    assert_eq!(events.last().unwrap().stage, Stage::Error);
}

struct FixedImporter;

#[async_trait]
impl MeshImporter for FixedImporter {
    async fn import(&self, _blob: Arc<[u8]>, _file_name: &str) -> cadlite_core::Result<SceneNode> {
        let mesh = ImportedMesh {
            positions: vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0],
            normals: None,
            indices: Some(vec![0, 1, 2]),
            color: Some([0.0, 0.0, 1.0]),
        };
        let mut moved = IDENTITY;
        moved[13] = 2.0;
        Ok(SceneNode::group("root", vec![SceneNode::leaf("hull", moved, mesh)]))
    }
}

#[tokio::test]
async fn legacy_scene_via_importer() {
    let loader = loader(LoaderConfig::default()).with_importer(Arc::new(FixedImporter));
    let assembly = loader.load_bytes("boat.3ds", vec![0x4d, 0x4d, 0, 0], &NoProgress).await.unwrap();
    assert_eq!(assembly.format, FormatTag::LegacyMesh);
    assert_eq!(assembly.parts[0].name, "hull");
    assert_eq!(assembly.parts[0].transform[13], 2.0);
    assert_eq!(assembly.parts[0].color(), Some([0.0, 0.0, 1.0]));
}

#[tokio::test]
async fn load_file_reads_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("disk.stl");
    std::fs::write(&path, binary_stl(2)).unwrap();

    let loader = loader(LoaderConfig::default());
    let assembly = loader.load_file(&path, &NoProgress).await.unwrap();
    assert_eq!(assembly.name, "disk");
    assert_eq!(assembly.total_triangles, 2);

    let small = self::loader(LoaderConfig::default().with_max_input_bytes(10));
    let err = small.load_file(&path, &NoProgress).await.unwrap_err();
    assert!(matches!(err, LoadError::SizeExceeded { .. }));
}

/// Serve one canned HTTP response per connection
async fn serve(response: Vec<u8>) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let response = response.clone();
            tokio::spawn(async move {
                let mut buf = [0u8; 4096];
                let _ = socket.read(&mut buf).await;
                let _ = socket.write_all(&response).await;
                let _ = socket.shutdown().await;
            });
        }
    });
    format!("http://{}", addr)
}

fn http_response(status: &str, headers: &str, body: &[u8]) -> Vec<u8> {
    let mut response = format!("HTTP/1.1 {}\r\nconnection: close\r\n{}\r\n", status, headers).into_bytes();
    response.extend_from_slice(body);
    response
}

#[tokio::test]
async fn load_url_downloads_and_parses() {
    let body = binary_stl(4);
    let base = serve(http_response(
        "200 OK",
        &format!("content-length: {}\r\n", body.len()),
        &body,
    ))
    .await;

    let loader = loader(LoaderConfig::default());
    let recorder = Recorder::default();
    let assembly = loader
        .load_url(&format!("{}/files/remote.stl?sig=abc", base), &recorder.sink())
        .await
        .unwrap();
    assert_eq!(assembly.total_triangles, 4);
    assert_eq!(assembly.name, "remote");

    let events = recorder.events();
    assert_well_ordered(&events);
    assert!(events
        .iter()
        .any(|e| e.stage == Stage::Fetching && e.bytes_total == Some(body.len() as u64)));
}

#[tokio::test]
async fn load_url_rejects_declared_oversize_and_bad_status() {
    let base = serve(http_response("200 OK", "content-length: 4096\r\n", &[0u8; 4096])).await;
    let loader = loader(LoaderConfig::default().with_max_input_bytes(1024));
    let err = loader.load_url(&format!("{}/huge.stl", base), &NoProgress).await.unwrap_err();
    assert!(matches!(err, LoadError::SizeExceeded { .. }));

    let base = serve(http_response("404 Not Found", "content-length: 0\r\n", b"")).await;
    let err = loader.load_url(&format!("{}/missing.stl", base), &NoProgress).await.unwrap_err();
    assert!(matches!(err, LoadError::Transport(ref m) if m.contains("404")));
}
