use std::{env, error::Error};

use proxy_connector::ProxyConfig;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let proxy = env::args()
        .nth(1)
        .unwrap_or_else(|| "http://127.0.0.1:8080".to_string());
    let config: ProxyConfig = proxy.parse()?;
    let state = config
        .connector()?
        .connect("www.narrowlink.com:80", &CancellationToken::new())
        .await;
    if let Some(cause) = state.cause() {
        eprintln!("{:?} proxy refused the tunnel: {}", config.proxy_type, cause);
    }
    let mut stream = state.into_result()?;
    stream
        .write_all("GET / HTTP/1.0\r\nHost: www.narrowlink.com\r\n\r\n".as_bytes())
        .await?;
    let mut buf = Vec::new();
    stream.read_to_end(&mut buf).await?;
    println!("{}", String::from_utf8_lossy(&buf));
    Ok(())
}
