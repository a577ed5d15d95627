use std::str::FromStr;

use ipnet::IpNet;
use util::vnet::*;

use super::agent_vnet_test::*;
use super::*;
use crate::util::*;

#[tokio::test]
async fn test_vnet_gather_no_local_ip_address() -> Result<()> {
    let vnet = Arc::new(net::Net::new(Some(net::NetConfig::default())));

    let a = Agent::new(AgentConfig {
        net: Some(Arc::clone(&vnet)),
        ..Default::default()
    })
    .await?;

    let local_ips = local_interfaces(
        &vnet,
        &a.interface_filter,
        &a.ip_filter,
        &[NetworkType::Udp4],
        false,
    )
    .await;
    assert!(local_ips.is_empty(), "should return no local IP");

    a.close().await?;

    Ok(())
}

#[tokio::test]
async fn test_vnet_gather_dynamic_ip_address() -> Result<()> {
    let cider = "1.2.3.0/24";
    let ipnet = IpNet::from_str(cider).map_err(|e| Error::Other(e.to_string()))?;

    let r = Arc::new(Mutex::new(router::Router::new(router::RouterConfig {
        cidr: cider.to_owned(),
        ..Default::default()
    })?));
    let nw = Arc::new(net::Net::new(Some(net::NetConfig::default())));
    connect_net2router(&nw, &r).await?;

    let a = Agent::new(AgentConfig {
        net: Some(Arc::clone(&nw)),
        ..Default::default()
    })
    .await?;

    let local_ips = local_interfaces(
        &nw,
        &a.interface_filter,
        &a.ip_filter,
        &[NetworkType::Udp4],
        false,
    )
    .await;
    assert!(!local_ips.is_empty(), "should have one local IP");

    for ip in &local_ips {
        if ip.is_loopback() {
            panic!("should not return loopback IP");
        }
        if !ipnet.contains(ip) {
            panic!("{ip} should be contained in the CIDR {ipnet}");
        }
    }

    a.close().await?;

    Ok(())
}

#[tokio::test]
async fn test_vnet_gather_listen_udp() -> Result<()> {
    let cider = "1.2.3.0/24";
    let r = Arc::new(Mutex::new(router::Router::new(router::RouterConfig {
        cidr: cider.to_owned(),
        ..Default::default()
    })?));
    let nw = Arc::new(net::Net::new(Some(net::NetConfig::default())));
    connect_net2router(&nw, &r).await?;

    let a = Agent::new(AgentConfig {
        net: Some(Arc::clone(&nw)),
        ..Default::default()
    })
    .await?;

    let local_ips = local_interfaces(
        &nw,
        &a.interface_filter,
        &a.ip_filter,
        &[NetworkType::Udp4],
        false,
    )
    .await;
    assert!(!local_ips.is_empty(), "should have one local IP");

    for ip in local_ips {
        let _ = listen_udp_in_port_range(&nw, 0, 0, SocketAddr::new(ip, 0)).await?;

        let result = listen_udp_in_port_range(&nw, 4999, 5000, SocketAddr::new(ip, 0)).await;
        assert!(
            result.is_err(),
            "listenUDP with invalid port range did not return ErrPort"
        );

        let conn = listen_udp_in_port_range(&nw, 5000, 5000, SocketAddr::new(ip, 0)).await?;
        let port = conn.local_addr()?.port();
        assert_eq!(
            port, 5000,
            "listenUDP with port restriction of 5000 listened on incorrect port ({port})"
        );
    }

    a.close().await?;

    Ok(())
}

#[tokio::test]
async fn test_vnet_gather_with_interface_filter() -> Result<()> {
    let r = Arc::new(Mutex::new(router::Router::new(router::RouterConfig {
        cidr: "1.2.3.0/24".to_owned(),
        ..Default::default()
    })?));
    let nw = Arc::new(net::Net::new(Some(net::NetConfig::default())));
    connect_net2router(&nw, &r).await?;

    //"InterfaceFilter should exclude the interface"
    {
        let a = Agent::new(AgentConfig {
            net: Some(Arc::clone(&nw)),
            interface_filter: Arc::new(Some(Box::new(|_: &str| -> bool {
                //assert_eq!("eth0", interface_name);
                false
            }))),
            ..Default::default()
        })
        .await?;

        let local_ips = local_interfaces(
            &nw,
            &a.interface_filter,
            &a.ip_filter,
            &[NetworkType::Udp4],
            false,
        )
        .await;
        assert!(
            local_ips.is_empty(),
            "InterfaceFilter should have excluded everything"
        );

        a.close().await?;
    }

    //"InterfaceFilter should not exclude the interface"
    {
        let a = Agent::new(AgentConfig {
            net: Some(Arc::clone(&nw)),
            interface_filter: Arc::new(Some(Box::new(|interface_name: &str| -> bool {
                "eth0" == interface_name
            }))),
            ..Default::default()
        })
        .await?;

        let local_ips = local_interfaces(
            &nw,
            &a.interface_filter,
            &a.ip_filter,
            &[NetworkType::Udp4],
            false,
        )
        .await;
        assert_eq!(
            local_ips.len(),
            1,
            "InterfaceFilter should not have excluded everything"
        );

        a.close().await?;
    }

    Ok(())
}

#[tokio::test]
async fn test_vnet_gather_turn_connection_leak() -> Result<()> {
    let turn_server_url = Url {
        scheme: SchemeType::Turn,
        host: VNET_STUN_SERVER_IP.to_owned(),
        port: VNET_STUN_SERVER_PORT,
        username: "user".to_owned(),
        password: "pass".to_owned(),
        proto: ProtoType::Udp,
    };

    // buildVNet with a Symmetric NATs for both LANs
    let nat_type = nat::NatType {
        mapping_behavior: nat::EndpointDependencyType::EndpointAddrPortDependent,
        filtering_behavior: nat::EndpointDependencyType::EndpointAddrPortDependent,
        ..Default::default()
    };

    let v = build_vnet(nat_type, nat_type).await?;

    let cfg0 = AgentConfig {
        urls: vec![turn_server_url.clone()],
        network_types: supported_network_types(),
        net: Some(Arc::clone(&v.net0)),
        ..Default::default()
    };

    let a_agent = Agent::new(cfg0).await?;

    {
        let agent_internal = Arc::clone(&a_agent.internal);
        Agent::gather_candidates_relay(
            vec![turn_server_url.clone()],
            Arc::clone(&v.net0),
            agent_internal,
        )
        .await;
    }

    // Assert relay conn leak on close.
    a_agent.close().await?;
    v.close().await?;

    Ok(())
}

