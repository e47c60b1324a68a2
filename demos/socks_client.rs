use std::error::Error;

use proxy_connector::{ProxyConnector, Socks5, SocksConfig};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let connector = ProxyConnector::new(
        "127.0.0.1:1080",
        Socks5::new(SocksConfig::with_credentials("user", "password")),
    )?;
    let mut stream = connector
        .connect("www.narrowlink.com:80", &CancellationToken::new())
        .await
        .into_result()?;
    stream
        .write_all("GET / HTTP/1.0\r\nHost: www.narrowlink.com\r\n\r\n".as_bytes())
        .await?;
    let mut buf = Vec::new();
    stream.read_to_end(&mut buf).await?;
    println!("{}", String::from_utf8_lossy(&buf));
    Ok(())
}
