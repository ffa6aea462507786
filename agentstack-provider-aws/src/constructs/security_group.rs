//! Security groups and their ingress rules

use std::fmt;

use agentstack_core::resource::{Resource, Value};
use agentstack_core::stack::Stack;

use super::ConstructError;
use super::network::Vpc;

/// Source of inbound traffic
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Peer {
    AnyIpv4,
    /// Another (or the same) security group, by logical id
    SecurityGroup(String),
}

impl fmt::Display for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Peer::AnyIpv4 => write!(f, "0.0.0.0/0"),
            Peer::SecurityGroup(id) => write!(f, "{}", id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Port {
    Tcp(u16),
    AllTcp,
    AllTraffic,
}

impl Port {
    fn logical_suffix(&self) -> String {
        match self {
            Port::Tcp(port) => format!("Tcp{}", port),
            Port::AllTcp => "AllTcp".to_string(),
            Port::AllTraffic => "AllTraffic".to_string(),
        }
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Port::Tcp(port) => write!(f, "tcp/{}", port),
            Port::AllTcp => write!(f, "tcp/0-65535"),
            Port::AllTraffic => write!(f, "all traffic"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IngressRule {
    pub logical_id: String,
    pub peer: Peer,
    pub port: Port,
    pub description: String,
}

#[derive(Debug, Clone)]
pub struct SecurityGroupProps {
    pub description: String,
    pub allow_all_outbound: bool,
}

#[derive(Debug, Clone)]
pub struct SecurityGroup {
    id: String,
    rules: Vec<IngressRule>,
}

impl SecurityGroup {
    pub fn new(
        stack: &mut Stack,
        id: &str,
        vpc: &Vpc,
        props: SecurityGroupProps,
    ) -> Result<Self, ConstructError> {
        let egress = if props.allow_all_outbound {
            Value::map([
                ("cidr_ip", Value::string("0.0.0.0/0")),
                ("ip_protocol", Value::string("-1")),
                ("description", Value::string("Allow all outbound traffic by default")),
            ])
        } else {
            // Placeholder rule matching no traffic; an empty list would keep the default allow-all
            Value::map([
                ("cidr_ip", Value::string("255.255.255.255/32")),
                ("ip_protocol", Value::string("icmp")),
                ("from_port", Value::Int(252)),
                ("to_port", Value::Int(86)),
                ("description", Value::string("Disallow all traffic")),
            ])
        };

        stack.add(
            Resource::new("ec2.security_group", id)
                .with_attribute("description", props.description.as_str())
                .with_attribute("vpc_id", vpc.vpc_ref())
                .with_attribute("security_group_egress", Value::List(vec![egress])),
        )?;

        Ok(Self {
            id: id.to_string(),
            rules: Vec::new(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Security group id, as referenced by other resources
    pub fn group_id(&self) -> Value {
        Value::attribute(&self.id, "GroupId")
    }

    /// Declare an inbound rule as its own resource
    pub fn add_ingress_rule(
        &mut self,
        stack: &mut Stack,
        peer: Peer,
        port: Port,
        description: &str,
    ) -> Result<(), ConstructError> {
        let peer_name = match &peer {
            Peer::AnyIpv4 => "AnyIPv4".to_string(),
            Peer::SecurityGroup(id) => id.clone(),
        };
        let logical_id = format!("{}From{}{}", self.id, peer_name, port.logical_suffix());

        let mut rule = Resource::new("ec2.security_group_ingress", &logical_id)
            .with_attribute("group_id", self.group_id())
            .with_attribute("description", description);
        rule = match port {
            Port::Tcp(p) => rule
                .with_attribute("ip_protocol", "tcp")
                .with_attribute("from_port", i64::from(p))
                .with_attribute("to_port", i64::from(p)),
            Port::AllTcp => rule
                .with_attribute("ip_protocol", "tcp")
                .with_attribute("from_port", 0i64)
                .with_attribute("to_port", 65535i64),
            Port::AllTraffic => rule.with_attribute("ip_protocol", "-1"),
        };
        rule = match &peer {
            Peer::AnyIpv4 => rule.with_attribute("cidr_ip", "0.0.0.0/0"),
            Peer::SecurityGroup(source) => {
                rule.with_attribute("source_security_group_id", Value::attribute(source, "GroupId"))
            }
        };

        stack.add(rule)?;
        log::debug!("{} allows {} from {}", self.id, port, peer);
        self.rules.push(IngressRule {
            logical_id,
            peer,
            port,
            description: description.to_string(),
        });
        Ok(())
    }

    /// Inbound rules, in the order they were added
    pub fn ingress_rules(&self) -> &[IngressRule] {
        &self.rules
    }
}
