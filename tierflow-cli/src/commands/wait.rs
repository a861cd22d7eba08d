use std::time::Duration;

/// Execute the `wait` command.
pub async fn execute(seconds: u64) {
    println!("waiting for {seconds} seconds to next stage");
    tokio::time::sleep(Duration::from_secs(seconds)).await;
}
