use clap::Parser;

fn main() -> anyhow::Result<()> {
    memeforge::run(memeforge::cli::Cli::parse())
}
