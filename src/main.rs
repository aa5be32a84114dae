#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = lms_assessments::run().await {
        eprintln!("lms-assessments fatal: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
