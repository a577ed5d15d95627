//! HTTP client for the signaling control plane: channel CRUD, endpoint
//! resolution and ICE server configuration.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct ControlPlaneClient {
    http: reqwest::Client,
    control_plane_url: String,
}

#[derive(Debug, Serialize)]
struct DescribeRequest<'a> {
    #[serde(rename = "ChannelName")]
    channel_name: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChannelInfoResponse {
    #[serde(rename = "ChannelInfo")]
    channel_info: ChannelArn,
}

#[derive(Debug, Deserialize)]
struct ChannelArn {
    #[serde(rename = "ChannelARN")]
    channel_arn: String,
}

#[derive(Debug, Serialize)]
struct CreateRequest<'a> {
    #[serde(rename = "ChannelName")]
    channel_name: &'a str,
    #[serde(rename = "ChannelType")]
    channel_type: &'a str,
}

#[derive(Debug, Deserialize)]
struct CreateResponse {
    #[serde(rename = "ChannelARN")]
    channel_arn: String,
}

#[derive(Debug, Serialize)]
struct GetEndpointRequest<'a> {
    #[serde(rename = "ChannelARN")]
    channel_arn: &'a str,
    #[serde(rename = "SingleMasterChannelEndpointConfiguration")]
    endpoint_config: EndpointConfig<'a>,
}

#[derive(Debug, Serialize)]
struct EndpointConfig<'a> {
    #[serde(rename = "Protocols")]
    protocols: &'a [&'a str],
    #[serde(rename = "Role")]
    role: &'a str,
}

#[derive(Debug, Deserialize)]
struct GetEndpointResponse {
    #[serde(rename = "ResourceEndpointList")]
    resource_endpoint_list: Vec<ResourceEndpoint>,
}

#[derive(Debug, Deserialize)]
struct ResourceEndpoint {
    #[serde(rename = "Protocol")]
    protocol: String,
    #[serde(rename = "ResourceEndpoint")]
    resource_endpoint: String,
}

#[derive(Debug, Clone, Default)]
pub struct Endpoints {
    pub https_endpoint: Option<String>,
    pub wss_endpoint: Option<String>,
}

#[derive(Debug, Serialize)]
struct DeleteRequest<'a> {
    #[serde(rename = "ChannelARN")]
    channel_arn: &'a str,
}

#[derive(Debug, Serialize)]
struct IceConfigRequest<'a> {
    #[serde(rename = "ChannelARN")]
    channel_arn: &'a str,
    #[serde(rename = "ClientId", skip_serializing_if = "Option::is_none")]
    client_id: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct IceConfigResponse {
    #[serde(rename = "IceServerList")]
    ice_server_list: Vec<IceServerEntry>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IceServerEntry {
    #[serde(rename = "Uris")]
    pub uris: Vec<String>,
    #[serde(rename = "Username", default)]
    pub username: String,
    #[serde(rename = "Password", default)]
    pub password: String,
    #[serde(rename = "Ttl")]
    pub ttl_seconds: u64,
}

impl ControlPlaneClient {
    pub fn new(control_plane_url: impl Into<String>, http: reqwest::Client) -> Self {
        Self {
            http,
            control_plane_url: control_plane_url.into(),
        }
    }

    async fn post<Req: Serialize, Resp: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        bearer_token: &str,
        body: &Req,
    ) -> Result<Resp> {
        let response = self
            .http
            .post(format!("{}{}", self.control_plane_url, path))
            .bearer_auth(bearer_token)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() == 401 {
            return Err(Error::Unauthorized);
        }
        if !status.is_success() {
            let description = response.text().await.unwrap_or_default();
            return Err(Error::Service {
                status: status.as_u16(),
                description,
            });
        }
        Ok(response.json::<Resp>().await?)
    }

    /// Returns `Ok(None)` on a 404 (channel doesn't exist yet) rather than
    /// an error, matching the FSM's `describe -> (if 404) create` edge.
    pub async fn describe_signaling_channel(
        &self,
        bearer_token: &str,
        channel_name: &str,
    ) -> Result<Option<String>> {
        let response = self
            .http
            .post(format!(
                "{}/describeSignalingChannel",
                self.control_plane_url
            ))
            .bearer_auth(bearer_token)
            .json(&DescribeRequest { channel_name })
            .send()
            .await?;

        if response.status().as_u16() == 404 {
            return Ok(None);
        }
        if response.status().as_u16() == 401 {
            return Err(Error::Unauthorized);
        }
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let description = response.text().await.unwrap_or_default();
            return Err(Error::Service { status, description });
        }

        let parsed: ChannelInfoResponse = response.json().await?;
        Ok(Some(parsed.channel_info.channel_arn))
    }

    pub async fn create_signaling_channel(
        &self,
        bearer_token: &str,
        channel_name: &str,
    ) -> Result<String> {
        let resp: CreateResponse = self
            .post(
                "/createSignalingChannel",
                bearer_token,
                &CreateRequest {
                    channel_name,
                    channel_type: "SINGLE_MASTER",
                },
            )
            .await?;
        Ok(resp.channel_arn)
    }

    pub async fn get_signaling_channel_endpoint(
        &self,
        bearer_token: &str,
        channel_arn: &str,
        role: &str,
    ) -> Result<Endpoints> {
        let resp: GetEndpointResponse = self
            .post(
                "/getSignalingChannelEndpoint",
                bearer_token,
                &GetEndpointRequest {
                    channel_arn,
                    endpoint_config: EndpointConfig {
                        protocols: &["WSS", "HTTPS"],
                        role,
                    },
                },
            )
            .await?;

        let mut endpoints = Endpoints::default();
        for entry in resp.resource_endpoint_list {
            match entry.protocol.as_str() {
                "WSS" => endpoints.wss_endpoint = Some(entry.resource_endpoint),
                "HTTPS" => endpoints.https_endpoint = Some(entry.resource_endpoint),
                _ => {}
            }
        }
        Ok(endpoints)
    }

    pub async fn delete_signaling_channel(&self, bearer_token: &str, channel_arn: &str) -> Result<()> {
        let _: serde_json::Value = self
            .post(
                "/deleteSignalingChannel",
                bearer_token,
                &DeleteRequest { channel_arn },
            )
            .await?;
        Ok(())
    }

    pub async fn get_ice_server_config(
        &self,
        bearer_token: &str,
        channel_arn: &str,
        client_id: Option<&str>,
    ) -> Result<Vec<IceServerEntry>> {
        let resp: IceConfigResponse = self
            .post(
                "/v1/get-ice-server-config",
                bearer_token,
                &IceConfigRequest {
                    channel_arn,
                    client_id,
                },
            )
            .await?;
        Ok(resp.ice_server_list)
    }
}
