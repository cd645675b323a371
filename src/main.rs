use anyhow::Result;

mod app;
mod logging;

fn main() -> Result<()> {
    let args = backup_staging::cli::parse();
    app::run(args)
}
