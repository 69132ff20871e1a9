fn main() {
    println!("cargo:rerun-if-changed=proto/wal.proto");
    prost_build::compile_protos(&["proto/wal.proto"], &["proto/"])
        .expect("compiling trace-wal protobuf schema");
}
