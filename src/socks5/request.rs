use std::net::SocketAddr;

use bytes::{BufMut, BytesMut};
use log::debug;

use super::{filter::Socks5Pack, AuthMethod, ATYP_DOMAIN, ATYP_IPV4, ATYP_IPV6, VERSION};
use crate::{
    address::DestinationAddress,
    codec::{BufferWriterExt, TextEncoding},
    config::Credentials,
    connection::PackageStream,
    error::{CodecError, ProxyError, SocksError},
    writer::MessageWriter,
    AsyncSocket,
};

const CMD_CONNECT: u8 = 0x01;
const RESERVED: u8 = 0x00;
const USER_PASS_VERSION: u8 = 0x01;

pub(crate) struct AuthRequest {
    pub methods: Vec<AuthMethod>,
}

pub(crate) struct UserPassRequest<'a> {
    pub credentials: &'a Credentials,
}

pub(crate) struct CommandRequest {
    pub command: u8,
    pub addr: DestinationAddress,
}

impl CommandRequest {
    pub fn connect(addr: DestinationAddress) -> Self {
        CommandRequest {
            command: CMD_CONNECT,
            addr,
        }
    }
}

pub(crate) struct Socks5Encoder;

impl MessageWriter<AuthRequest> for Socks5Encoder {
    fn write_message(&self, message: &AuthRequest, buf: &mut BytesMut) -> Result<(), CodecError> {
        buf.put_u8(VERSION);
        buf.put_u8(message.methods.len() as u8);
        buf.extend(message.methods.iter().map(u8::from));
        Ok(())
    }
}

impl MessageWriter<UserPassRequest<'_>> for Socks5Encoder {
    fn write_message(
        &self,
        message: &UserPassRequest<'_>,
        buf: &mut BytesMut,
    ) -> Result<(), CodecError> {
        buf.write_little_endian(USER_PASS_VERSION);
        buf.write_str_with_length(&message.credentials.username, TextEncoding::Ascii)?;
        buf.write_str_with_length(&message.credentials.password, TextEncoding::Ascii)?;
        Ok(())
    }
}

impl MessageWriter<CommandRequest> for Socks5Encoder {
    fn write_message(
        &self,
        message: &CommandRequest,
        buf: &mut BytesMut,
    ) -> Result<(), CodecError> {
        buf.put_slice(&[VERSION, message.command, RESERVED]);
        match &message.addr {
            DestinationAddress::Ip(SocketAddr::V4(addr)) => {
                buf.write_little_endian(ATYP_IPV4);
                buf.put_slice(&addr.ip().octets());
            }
            DestinationAddress::Ip(SocketAddr::V6(addr)) => {
                buf.write_little_endian(ATYP_IPV6);
                buf.put_slice(&addr.ip().octets());
            }
            DestinationAddress::Domain(domain, _) => {
                buf.write_little_endian(ATYP_DOMAIN);
                buf.write_str_with_length(domain, TextEncoding::Ascii)?;
            }
        }
        buf.write_big_endian(message.addr.port());
        Ok(())
    }
}

/// Sends each handshake phase's request and waits for its decoded reply.
pub(crate) struct Socks5Request<'a, S> {
    packages: PackageStream<'a, S, Socks5Pack>,
    remote: &'a DestinationAddress,
    credentials: Option<&'a Credentials>,
}

impl<'a, S: AsyncSocket> Socks5Request<'a, S> {
    pub fn new(
        packages: PackageStream<'a, S, Socks5Pack>,
        remote: &'a DestinationAddress,
        credentials: Option<&'a Credentials>,
    ) -> Self {
        Socks5Request {
            packages,
            remote,
            credentials,
        }
    }

    pub async fn send_handshake(&mut self) -> Result<Socks5Pack, ProxyError> {
        let methods = match self.credentials {
            Some(_) => vec![AuthMethod::NoAuth, AuthMethod::UsernamePassword],
            None => vec![AuthMethod::NoAuth],
        };
        self.packages
            .connection()
            .send_message(&Socks5Encoder, &AuthRequest { methods })
            .await?;
        self.packages.receive().await
    }

    pub async fn send_authenticate(&mut self) -> Result<Socks5Pack, ProxyError> {
        let credentials = self.credentials.ok_or_else(|| {
            SocksError::ProtocolViolation(
                "proxy asked for credentials that were not offered".into(),
            )
        })?;
        debug!("authenticating to socks5 proxy as {}", credentials.username);
        self.packages
            .connection()
            .send_message(&Socks5Encoder, &UserPassRequest { credentials })
            .await?;
        self.packages.receive().await
    }

    pub async fn send_endpoint(&mut self) -> Result<Socks5Pack, ProxyError> {
        debug!("requesting socks5 connect to {}", self.remote);
        self.packages
            .connection()
            .send_message(&Socks5Encoder, &CommandRequest::connect(self.remote.clone()))
            .await?;
        self.packages.receive().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode<M>(message: &M) -> Result<BytesMut, CodecError>
    where
        Socks5Encoder: MessageWriter<M>,
    {
        let mut buf = BytesMut::new();
        Socks5Encoder.write_message(message, &mut buf)?;
        Ok(buf)
    }

    #[test]
    fn greeting_frames() {
        let no_auth = encode(&AuthRequest {
            methods: vec![AuthMethod::NoAuth],
        })
        .unwrap();
        assert_eq!(&no_auth[..], &[0x05, 0x01, 0x00]);

        let with_auth = encode(&AuthRequest {
            methods: vec![AuthMethod::NoAuth, AuthMethod::UsernamePassword],
        })
        .unwrap();
        assert_eq!(&with_auth[..], &[0x05, 0x02, 0x00, 0x02]);
    }

    #[test]
    fn user_pass_frame() {
        let credentials = Credentials::new("user", "secret");
        let frame = encode(&UserPassRequest {
            credentials: &credentials,
        })
        .unwrap();
        assert_eq!(&frame[..], b"\x01\x04user\x06secret");

        let credentials = Credentials::new("u".repeat(256), "p");
        assert!(matches!(
            encode(&UserPassRequest {
                credentials: &credentials,
            }),
            Err(CodecError::ValueTooLarge(256))
        ));
    }

    #[test]
    fn connect_frames() {
        let v4 = encode(&CommandRequest::connect(DestinationAddress::Ip(
            "10.1.2.3:8080".parse().unwrap(),
        )))
        .unwrap();
        assert_eq!(&v4[..], &[5, 1, 0, 1, 10, 1, 2, 3, 0x1f, 0x90]);

        let v6 = encode(&CommandRequest::connect(DestinationAddress::Ip(
            "[::1]:80".parse().unwrap(),
        )))
        .unwrap();
        assert_eq!(v6[3], ATYP_IPV6);
        assert_eq!(v6.len(), 4 + 16 + 2);
        assert_eq!(&v6[v6.len() - 3..], &[1, 0, 80]);

        let domain = encode(&CommandRequest::connect(DestinationAddress::Domain(
            "example.com".into(),
            443,
        )))
        .unwrap();
        assert_eq!(&domain[..5], &[5, 1, 0, 3, 11]);
        assert_eq!(&domain[5..16], b"example.com");
        assert_eq!(&domain[16..], &[1, 0xbb]);
    }
}
