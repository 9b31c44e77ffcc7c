fn main() -> anyhow::Result<()> {
    // The browser build starts from the wasm entry point in the library.
    #[cfg(not(target_arch = "wasm32"))]
    figurine::run()?;
    Ok(())
}
