#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = lms_assessments::run_worker().await {
        eprintln!("lms-assessments-worker fatal: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
