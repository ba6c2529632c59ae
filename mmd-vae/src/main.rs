use clap::Parser;
use log::info;
use mmd_vae::fit_info_vae::{fit_info_vae, InfoVaeArgs};

fn main() -> anyhow::Result<()> {
    let args = InfoVaeArgs::parse();

    if args.verbose {
        std::env::set_var("RUST_LOG", "info");
    }
    env_logger::init();

    let outcome = fit_info_vae(&args)?;

    info!(
        "train nll {:.4}, test nll {:.4}, log: {}",
        outcome.train_nll,
        outcome.test_nll,
        outcome.log_path.display()
    );
    info!("Done");
    Ok(())
}
