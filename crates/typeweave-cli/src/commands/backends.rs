//! List compiled-in backends.

pub fn run() -> anyhow::Result<()> {
    for backend in typeweave::backends() {
        println!(
            "{:<12} {:<12} {}",
            backend.name(),
            backend.language(),
            backend.category().as_str()
        );
    }
    Ok(())
}
