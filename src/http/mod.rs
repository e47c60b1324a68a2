mod config;

use base64::{engine::general_purpose, Engine as _};
use bytes::BytesMut;
use log::debug;

pub use config::Config as HttpConfig;

use crate::{
    address::DestinationAddress,
    codec::{BufferWriterExt, TextEncoding},
    config::Credentials,
    connection::Connection,
    connector::ProxyHandshake,
    error::{CodecError, HttpError, ProxyError},
    filter::{LineFilter, TextPackage},
    writer::MessageWriter,
    AsyncSocket,
};

const RESPONSE_PREFIX: &str = "HTTP/1.";
const NEW_LINE: &str = "\r\n";

/// HTTP CONNECT tunnelling, RFC 7231 section 4.3.6.
#[derive(Default)]
pub struct HttpConnect {
    config: HttpConfig,
}

impl HttpConnect {
    pub fn new(config: HttpConfig) -> Self {
        HttpConnect { config }
    }
}

pub(crate) struct ConnectRequest<'a> {
    pub addr: &'a DestinationAddress,
    pub credentials: Option<&'a Credentials>,
}

pub(crate) struct HttpEncoder;

impl MessageWriter<ConnectRequest<'_>> for HttpEncoder {
    fn write_message(
        &self,
        message: &ConnectRequest<'_>,
        buf: &mut BytesMut,
    ) -> Result<(), CodecError> {
        let encoding = TextEncoding::Ascii;
        let authority = message.addr.to_string();
        buf.write_str(
            &format!(
                "CONNECT {0} HTTP/1.1\r\nHost: {0}\r\nProxy-Connection: Keep-Alive\r\n",
                authority
            ),
            encoding,
        );
        if let Some(credentials) = message.credentials {
            let token = format!("{}:{}", credentials.username, credentials.password);
            buf.write_str("Proxy-Authorization: Basic ", encoding);
            buf.write_str(
                &general_purpose::STANDARD.encode(encoding.encode(&token)),
                encoding,
            );
            buf.write_str(NEW_LINE, encoding);
        }
        buf.write_str(NEW_LINE, encoding);
        Ok(())
    }
}

/// Checks the status line of the proxy's answer.
fn handle_response(line: &TextPackage) -> Result<(), HttpError> {
    let text = line.text.as_str();
    let has_prefix = text
        .get(..RESPONSE_PREFIX.len())
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(RESPONSE_PREFIX));
    let pos = text.find(' ').filter(|pos| *pos > 0);
    let (true, Some(pos)) = (has_prefix, pos) else {
        return Err(HttpError::InvalidResponse(text.to_string()));
    };

    let status_code = text
        .get(pos + 1..pos + 4)
        .and_then(|code| code.parse::<u16>().ok())
        .ok_or_else(|| HttpError::InvalidResponse(text.to_string()))?;
    if !(200..=299).contains(&status_code) {
        return Err(HttpError::Rejected(status_code));
    }
    Ok(())
}

impl ProxyHandshake for HttpConnect {
    async fn negotiate<S: AsyncSocket>(
        &self,
        remote: &DestinationAddress,
        connection: &mut Connection<S>,
    ) -> Result<(), ProxyError> {
        let mut lines = connection.package_stream(Box::new(LineFilter::default()));
        lines
            .connection()
            .send_message(
                &HttpEncoder,
                &ConnectRequest {
                    addr: remote,
                    credentials: self.config.credentials(),
                },
            )
            .await?;

        let status = lines.receive().await?;
        handle_response(&status)?;
        debug!("http proxy answered: {}", status.text);

        // headers are not interpreted, only skipped up to the blank line
        while !lines.receive().await?.text.is_empty() {}
        Ok(())
    }
}
