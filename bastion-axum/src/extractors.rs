use std::net::SocketAddr;

use axum::{
    RequestPartsExt,
    extract::{ConnectInfo, FromRequestParts},
    http::{HeaderMap, request::Parts},
};
use axum_extra::{TypedHeader, headers::UserAgent};
use bastion::IpAddress;

use crate::{
    error::ApiError,
    types::{ClientInfo, ClientIpSource},
};

const DEVICE_ID_HEADER: &str = "x-device-id";

impl<S> FromRequestParts<S> for ClientInfo
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let source = parts
            .extensions
            .get::<ClientIpSource>()
            .copied()
            .unwrap_or_default();

        let user_agent = parts
            .extract::<Option<TypedHeader<UserAgent>>>()
            .await
            .map_err(|_| ApiError::BadRequest("Invalid user agent header".to_string()))?
            .map(|ua| ua.to_string());

        let peer = parts
            .extract::<ConnectInfo<SocketAddr>>()
            .await
            .ok()
            .map(|ConnectInfo(addr)| IpAddress::from(addr.ip()));

        let ip = match source {
            ClientIpSource::ConnectInfo => peer,
            ClientIpSource::ForwardedHeaders => forwarded_ip(&parts.headers).or(peer),
        }
        .ok_or_else(|| ApiError::BadRequest("Client address unavailable".to_string()))?;

        let device_id = header_value(&parts.headers, DEVICE_ID_HEADER);

        Ok(ClientInfo {
            ip,
            user_agent,
            device_id,
        })
    }
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Client IP from proxy headers. Unparseable values are ignored.
///
/// Only the last `X-Forwarded-For` hop is used: it is the one the trusted proxy appended.
/// Everything to its left was supplied by the client.
fn forwarded_ip(headers: &HeaderMap) -> Option<IpAddress> {
    let forwarded = headers
        .get_all("x-forwarded-for")
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .last()
        .and_then(|value| IpAddress::create(value).ok());
    if forwarded.is_some() {
        return forwarded;
    }

    header_value(headers, "x-real-ip").and_then(|value| IpAddress::create(&value).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_forwarded_ip_takes_proxy_appended_hop() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("1.2.3.4, 5.6.7.8"),
        );
        headers.insert("x-real-ip", HeaderValue::from_static("9.9.9.9"));

        assert_eq!(
            forwarded_ip(&headers),
            Some(IpAddress::create("5.6.7.8").unwrap())
        );
    }

    #[test]
    fn test_forwarded_ip_uses_last_header_line() {
        let mut headers = HeaderMap::new();
        headers.append("x-forwarded-for", HeaderValue::from_static("1.2.3.4"));
        headers.append("x-forwarded-for", HeaderValue::from_static("5.6.7.8, 10.1.1.1"));

        assert_eq!(
            forwarded_ip(&headers),
            Some(IpAddress::create("10.1.1.1").unwrap())
        );
    }

    #[test]
    fn test_forwarded_ip_falls_back_to_real_ip() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("not-an-ip"));
        headers.insert("x-real-ip", HeaderValue::from_static("9.9.9.9"));

        assert_eq!(
            forwarded_ip(&headers),
            Some(IpAddress::create("9.9.9.9").unwrap())
        );
    }

    #[test]
    fn test_forwarded_ip_none_when_missing() {
        assert_eq!(forwarded_ip(&HeaderMap::new()), None);
    }
}
