use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use bytes::{Buf, Bytes};

use super::{ATYP_DOMAIN, ATYP_IPV4, ATYP_IPV6, VERSION};
use crate::{
    error::CodecError,
    filter::{
        BoxedFilter, Decoded, FixedHeaderDecoder, FixedHeaderFilter, FixedSizeDecoder,
        FixedSizeFilter,
    },
};

const IPV4_LEN: usize = 4;
const IPV6_LEN: usize = 16;
const PORT_LEN: usize = 2;
const METHOD_USER_PASS: u8 = 0x02;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Socks5Phase {
    Handshake,
    Authenticate,
    EndPoint,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Socks5Address {
    Ip(IpAddr),
    Domain(String),
}

/// A decoded proxy reply. `reserve`, `dest_addr` and `dest_port` are only
/// present on the end point reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Socks5Pack {
    pub phase: Socks5Phase,
    pub version: u8,
    pub status: u8,
    pub reserve: Option<u8>,
    pub dest_addr: Option<Socks5Address>,
    pub dest_port: Option<u16>,
}

impl Socks5Pack {
    fn two_bytes(phase: Socks5Phase, mut frame: Bytes) -> Self {
        Socks5Pack {
            phase,
            version: frame.get_u8(),
            status: frame.get_u8(),
            reserve: None,
            dest_addr: None,
            dest_port: None,
        }
    }
}

/// `[version, method]`. Picks the framing of the next reply from the method
/// the proxy selected.
pub(crate) struct HandshakeDecoder;

impl HandshakeDecoder {
    pub(crate) fn filter() -> BoxedFilter<Socks5Pack> {
        FixedSizeFilter::boxed(HandshakeDecoder)
    }
}

impl FixedSizeDecoder for HandshakeDecoder {
    type Package = Socks5Pack;

    fn size(&self) -> usize {
        2
    }

    fn decode(&mut self, frame: Bytes) -> Result<Decoded<Socks5Pack>, CodecError> {
        let pack = Socks5Pack::two_bytes(Socks5Phase::Handshake, frame);
        if pack.version != VERSION {
            return Err(CodecError::InvalidVersion(pack.version));
        }
        let next = if pack.status == METHOD_USER_PASS {
            FixedSizeFilter::boxed(AuthDecoder)
        } else {
            FixedHeaderFilter::boxed(EndPointDecoder)
        };
        Ok(Decoded::then(pack, next))
    }
}

/// `[version, status]` of the username/password sub-negotiation.
pub(crate) struct AuthDecoder;

impl FixedSizeDecoder for AuthDecoder {
    type Package = Socks5Pack;

    fn size(&self) -> usize {
        2
    }

    fn decode(&mut self, frame: Bytes) -> Result<Decoded<Socks5Pack>, CodecError> {
        Ok(Decoded::then(
            Socks5Pack::two_bytes(Socks5Phase::Authenticate, frame),
            FixedHeaderFilter::boxed(EndPointDecoder),
        ))
    }
}

/// `[version, status, reserved, atyp, addr.., port]`. The header runs one
/// byte into the address so a domain's length octet is part of it.
pub(crate) struct EndPointDecoder;

impl FixedHeaderDecoder for EndPointDecoder {
    type Package = Socks5Pack;

    fn header_size(&self) -> usize {
        5
    }

    fn body_len(&self, header: &[u8]) -> Result<usize, CodecError> {
        match header[3] {
            ATYP_IPV4 => Ok(IPV4_LEN - 1 + PORT_LEN),
            ATYP_IPV6 => Ok(IPV6_LEN - 1 + PORT_LEN),
            ATYP_DOMAIN => Ok(header[4] as usize + PORT_LEN),
            atyp => Err(CodecError::UnsupportedAddressType(atyp)),
        }
    }

    fn decode(&mut self, mut frame: Bytes) -> Result<Decoded<Socks5Pack>, CodecError> {
        let version = frame.get_u8();
        if version != VERSION {
            return Err(CodecError::InvalidVersion(version));
        }
        let status = frame.get_u8();
        let reserve = frame.get_u8();
        let addr = match frame.get_u8() {
            ATYP_IPV4 => Socks5Address::Ip(IpAddr::V4(Ipv4Addr::from(frame.get_u32()))),
            ATYP_IPV6 => Socks5Address::Ip(IpAddr::V6(Ipv6Addr::from(frame.get_u128()))),
            ATYP_DOMAIN => {
                let len = frame.get_u8() as usize;
                let domain = frame.split_to(len);
                Socks5Address::Domain(String::from_utf8_lossy(&domain).into_owned())
            }
            atyp => return Err(CodecError::UnsupportedAddressType(atyp)),
        };
        let port = frame.get_u16();

        Ok(Decoded::new(Socks5Pack {
            phase: Socks5Phase::EndPoint,
            version,
            status,
            reserve: Some(reserve),
            dest_addr: Some(addr),
            dest_port: Some(port),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        address::DestinationAddress,
        filter::PipelineFilter,
        socks5::request::{CommandRequest, Socks5Encoder},
        writer::MessageWriter,
    };
    use bytes::BytesMut;
    use std::net::SocketAddr;

    fn decode_all(
        filter: &mut BoxedFilter<Socks5Pack>,
        input: &[u8],
    ) -> Result<Vec<Socks5Pack>, CodecError> {
        let mut buf = BytesMut::new();
        let mut packs = Vec::new();
        for byte in input {
            buf.extend_from_slice(&[*byte]);
            while let Some(decoded) = filter.filter(&mut buf)? {
                packs.push(decoded.package);
                if let Some(next) = decoded.next {
                    *filter = next;
                }
            }
        }
        assert!(buf.is_empty());
        Ok(packs)
    }

    #[test]
    fn end_point_reply_round_trips_request_address() {
        let destinations = [
            DestinationAddress::Ip(SocketAddr::from(([192, 168, 1, 20], 1080))),
            DestinationAddress::Ip("[2001:db8::7]:443".parse().unwrap()),
            DestinationAddress::Domain("a".repeat(255), 65535),
        ];
        for addr in destinations {
            let mut request = BytesMut::new();
            Socks5Encoder
                .write_message(&CommandRequest::connect(addr.clone()), &mut request)
                .unwrap();

            // the reply echoes [atyp, addr.., port] behind its own header
            let mut reply = vec![VERSION, 0x00, 0x00];
            reply.extend_from_slice(&request[3..]);

            let mut filter = FixedHeaderFilter::boxed(EndPointDecoder);
            let packs = decode_all(&mut filter, &reply).unwrap();
            assert_eq!(packs.len(), 1);
            let pack = &packs[0];
            assert_eq!(pack.dest_port, Some(addr.port()));
            let expected = match &addr {
                DestinationAddress::Ip(ip) => Socks5Address::Ip(ip.ip()),
                DestinationAddress::Domain(domain, _) => Socks5Address::Domain(domain.clone()),
            };
            assert_eq!(pack.dest_addr, Some(expected));
        }
    }

    #[test]
    fn end_point_reply_waits_for_declared_body() {
        let reply = [5u8, 0, 0, 3, 4, b'h', b'o', b's', b't', 0, 80];
        let mut filter = FixedHeaderFilter::new(EndPointDecoder);
        let mut buf = BytesMut::new();
        for (i, byte) in reply.iter().enumerate() {
            buf.extend_from_slice(&[*byte]);
            let decoded = filter.filter(&mut buf).unwrap();
            if i + 1 < reply.len() {
                assert!(decoded.is_none(), "decoded early at byte {}", i);
            } else {
                let pack = decoded.unwrap().package;
                assert_eq!(pack.dest_addr, Some(Socks5Address::Domain("host".into())));
                assert_eq!(pack.dest_port, Some(80));
            }
        }
    }

    #[test]
    fn handshake_selects_next_phase() {
        let mut filter = HandshakeDecoder::filter();
        let packs = decode_all(&mut filter, &[5, 0, 5, 0, 0, 1, 127, 0, 0, 1, 0x1f, 0x90]).unwrap();
        assert_eq!(packs[0].phase, Socks5Phase::Handshake);
        assert_eq!(packs[1].phase, Socks5Phase::EndPoint);

        let mut filter = HandshakeDecoder::filter();
        let packs =
            decode_all(&mut filter, &[5, 2, 1, 0, 5, 0, 0, 1, 127, 0, 0, 1, 0x1f, 0x90]).unwrap();
        let phases: Vec<_> = packs.iter().map(|p| p.phase).collect();
        assert_eq!(
            phases,
            [Socks5Phase::Handshake, Socks5Phase::Authenticate, Socks5Phase::EndPoint]
        );
    }

    #[test]
    fn unsupported_address_type() {
        let mut filter = FixedHeaderFilter::boxed(EndPointDecoder);
        assert!(matches!(
            decode_all(&mut filter, &[5, 0, 0, 9, 0]),
            Err(CodecError::UnsupportedAddressType(9))
        ));
    }

    #[test]
    fn wrong_version() {
        let mut filter = HandshakeDecoder::filter();
        assert!(matches!(
            decode_all(&mut filter, &[4, 0]),
            Err(CodecError::InvalidVersion(4))
        ));
    }
}
