fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Every `bytes` field becomes `bytes::Bytes` rather than `Vec<u8>` so
    // payloads can cross the proxy (client format == backend format) without
    // a copy, per spec.md §3's binary-payload invariant.
    tonic_build::configure()
        .bytes(["."])
        .compile_protos(&["proto/cache_service.proto"], &["proto"])?;
    Ok(())
}
