use std::path::PathBuf;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let out_dir = PathBuf::from(std::env::var("OUT_DIR")?);

    // Jaeger model and remote storage plugin services
    tonic_build::configure()
        .build_server(true)
        .build_client(true)
        .file_descriptor_set_path(out_dir.join("storage_descriptor.bin"))
        .compile_protos(&["proto/model.proto", "proto/storage.proto"], &["proto"])?;

    // Health checking
    tonic_build::configure()
        .build_server(true)
        .build_client(false)
        .file_descriptor_set_path(out_dir.join("health_descriptor.bin"))
        .compile_protos(&["proto/health.proto"], &["proto"])?;

    println!("cargo:rerun-if-changed=proto");
    Ok(())
}
