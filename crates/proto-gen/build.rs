// Build script to generate gRPC service stubs for the Gatekeeper services.
//
// Message types are declared by hand in `src/lib.rs` with prost derives, so
// only the service traits, servers and clients are generated here. This keeps
// the build free of a system `protoc` dependency.

use tonic_build::manual::{Builder, Method, Service};

const PACKAGE: &str = "gatekeeper";
const CODEC: &str = "tonic::codec::ProstCodec";

fn unary(name: &str, route: &str, input: &str, output: &str) -> Method {
    Method::builder()
        .name(name)
        .route_name(route)
        .input_type(input)
        .output_type(output)
        .codec_path(CODEC)
        .build()
}

fn server_streaming(name: &str, route: &str, input: &str, output: &str) -> Method {
    Method::builder()
        .name(name)
        .route_name(route)
        .input_type(input)
        .output_type(output)
        .codec_path(CODEC)
        .server_streaming()
        .build()
}

fn main() {
    let nothing = "crate::gatekeeper::Nothing";

    let biz = Service::builder()
        .name("Biz")
        .package(PACKAGE)
        .method(unary("check", "Check", nothing, nothing))
        .method(unary("add", "Add", nothing, nothing))
        .method(unary("test", "Test", nothing, nothing))
        .build();

    let admin = Service::builder()
        .name("Admin")
        .package(PACKAGE)
        .method(server_streaming(
            "logging",
            "Logging",
            nothing,
            "crate::gatekeeper::Event",
        ))
        .method(server_streaming(
            "statistics",
            "Statistics",
            "crate::gatekeeper::StatInterval",
            "crate::gatekeeper::Stat",
        ))
        .build();

    Builder::new().compile(&[biz, admin]);

    println!("cargo:rerun-if-changed=build.rs");
}
