//! Send one request and print what happened on every hop.
//!
//! ```text
//! cargo run --example send_request -- http://httpbin.org/redirect/2
//! ```

use hopnet::http::Request;
use hopnet::urlrequest::{BeforeRedirect, RequestEngine, RequestObserver, RequestOptions};
use std::sync::Arc;
use std::time::Duration;

struct PrintObserver;

impl RequestObserver for PrintObserver {
    fn on_load_start(&self) {
        println!("-> hop started");
    }

    fn on_before_redirect(&self, event: &mut BeforeRedirect) {
        println!("   redirect to {}", event.location);
    }

    fn on_load_end(&self) {
        println!("<- hop finished");
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let url = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "http://httpbin.org/redirect/2".to_string());

    let options = RequestOptions::default()
        .timeout(Duration::from_secs(10))
        .default_headers(true);
    let engine = RequestEngine::new(Request::get(url), options)?;
    engine.add_observer(Arc::new(PrintObserver));

    match engine.send().await {
        Ok(log) => {
            for record in &log.redirects {
                println!("redirect {} -> {}", record.response.status, record.url);
            }
            if let Some(response) = log.response() {
                println!("Status: {} {}", response.status, response.status_text);
                println!("Timing: {:?}", response.timing);
                println!("{}", response.text()?);
            }
        }
        Err(e) => println!("Request failed: {}", e),
    }
    Ok(())
}
