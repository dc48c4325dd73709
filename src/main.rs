/// Entry point for the `mutir` binary.
fn main() -> anyhow::Result<()> {
    mutir::cli::run()
}
