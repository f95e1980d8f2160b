fn main() -> anyhow::Result<()> {
    bundlerouter::cli::run_cli()
}
