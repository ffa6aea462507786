//! Network - VPC with public and private subnets across availability zones

use std::net::Ipv4Addr;

use agentstack_core::resource::{Resource, Value};
use agentstack_core::schema::validate_cidr;
use agentstack_core::stack::Stack;

use super::{ConstructError, name_tag};
use crate::schemas::types::validate_availability_zone;

pub const DEFAULT_VPC_CIDR: &str = "10.0.0.0/16";

/// Smallest subnet a VPC can be carved into
const MAX_SUBNET_PREFIX: u8 = 28;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubnetType {
    /// Routes to the internet gateway
    Public,
    /// No inbound route from the internet; outbound through a NAT gateway
    PrivateWithEgress,
}

#[derive(Debug, Clone)]
pub struct VpcProps {
    pub cidr: String,
    /// Zones available in the region, in preference order
    pub availability_zones: Vec<String>,
    pub max_azs: usize,
    pub nat_gateways: usize,
}

impl VpcProps {
    pub fn new(availability_zones: Vec<String>) -> Self {
        Self {
            cidr: DEFAULT_VPC_CIDR.to_string(),
            availability_zones,
            max_azs: 2,
            nat_gateways: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Subnet {
    pub logical_id: String,
    pub subnet_type: SubnetType,
    pub availability_zone: String,
    pub cidr: String,
    pub route_table: String,
    pub default_route: String,
}

impl Subnet {
    pub fn subnet_ref(&self) -> Value {
        Value::reference(&self.logical_id)
    }
}

#[derive(Debug, Clone)]
pub struct Vpc {
    id: String,
    cidr: String,
    subnets: Vec<Subnet>,
    internet_gateway: String,
    nat_gateways: Vec<String>,
}

impl Vpc {
    pub fn new(stack: &mut Stack, id: &str, props: VpcProps) -> Result<Self, ConstructError> {
        let (network, prefix) = parse_cidr(&props.cidr).map_err(|e| ConstructError::invalid(id, e))?;

        if props.max_azs == 0 || props.max_azs > props.availability_zones.len() {
            return Err(ConstructError::invalid(
                id,
                format!(
                    "max_azs must be between 1 and {} (the configured zones), got {}",
                    props.availability_zones.len(),
                    props.max_azs
                ),
            ));
        }
        if props.nat_gateways == 0 {
            return Err(ConstructError::invalid(
                id,
                "private subnets with egress need at least one NAT gateway",
            ));
        }
        if props.nat_gateways > props.max_azs {
            return Err(ConstructError::invalid(
                id,
                format!(
                    "{} NAT gateways requested but only {} public subnets",
                    props.nat_gateways, props.max_azs
                ),
            ));
        }
        let zones = &props.availability_zones[..props.max_azs];
        for zone in zones {
            validate_availability_zone(zone).map_err(|e| ConstructError::invalid(id, e))?;
        }

        let cidrs = split_cidr(network, prefix, zones.len() * 2).map_err(|e| ConstructError::invalid(id, e))?;
        let tag_prefix = format!("{}/{}", stack.name(), id);

        stack.add(
            Resource::new("ec2.vpc", id)
                .with_attribute("cidr_block", props.cidr.as_str())
                .with_attribute("enable_dns_support", true)
                .with_attribute("enable_dns_hostnames", true)
                .with_attribute("instance_tenancy", "default")
                .with_attribute("tags", name_tag(&tag_prefix)),
        )?;

        let igw = format!("{}IGW", id);
        stack.add(Resource::new("ec2.internet_gateway", &igw).with_attribute("tags", name_tag(&tag_prefix)))?;
        let attachment = format!("{}VPCGW", id);
        stack.add(
            Resource::new("ec2.vpc_gateway_attachment", &attachment)
                .with_attribute("vpc_id", Value::reference(id))
                .with_attribute("internet_gateway_id", Value::reference(&igw)),
        )?;

        let mut vpc = Self {
            id: id.to_string(),
            cidr: props.cidr.clone(),
            subnets: Vec::new(),
            internet_gateway: igw.clone(),
            nat_gateways: Vec::new(),
        };

        for (i, zone) in zones.iter().enumerate() {
            let name = format!("{}PublicSubnet{}", id, i + 1);
            let subnet = vpc.declare_subnet(stack, &name, SubnetType::Public, zone, &cidrs[i], &tag_prefix, |route| {
                route
                    .with_attribute("gateway_id", Value::reference(&igw))
                    .with_dependency(&attachment)
            })?;

            if i < props.nat_gateways {
                let eip = format!("{}EIP", name);
                stack.add(
                    Resource::new("ec2.eip", &eip)
                        .with_attribute("domain", "vpc")
                        .with_attribute("tags", name_tag(format!("{}/PublicSubnet{}", tag_prefix, i + 1))),
                )?;
                let nat = format!("{}NATGateway", name);
                stack.add(
                    Resource::new("ec2.nat_gateway", &nat)
                        .with_attribute("subnet_id", subnet.subnet_ref())
                        .with_attribute("allocation_id", Value::attribute(&eip, "AllocationId"))
                        .with_attribute("tags", name_tag(format!("{}/PublicSubnet{}", tag_prefix, i + 1)))
                        .with_dependency(&subnet.default_route),
                )?;
                vpc.nat_gateways.push(nat);
            }
        }

        for (i, zone) in zones.iter().enumerate() {
            let name = format!("{}PrivateSubnet{}", id, i + 1);
            let nat = vpc.nat_gateways[i % vpc.nat_gateways.len()].clone();
            vpc.declare_subnet(
                stack,
                &name,
                SubnetType::PrivateWithEgress,
                zone,
                &cidrs[zones.len() + i],
                &tag_prefix,
                |route| route.with_attribute("nat_gateway_id", Value::reference(&nat)),
            )?;
        }

        log::info!(
            "declared VPC {} with {} subnets and {} NAT gateway(s)",
            id,
            vpc.subnets.len(),
            vpc.nat_gateways.len()
        );
        Ok(vpc)
    }

    /// Subnet, route table, association and default route, in that order
    #[allow(clippy::too_many_arguments)]
    fn declare_subnet(
        &mut self,
        stack: &mut Stack,
        name: &str,
        subnet_type: SubnetType,
        zone: &str,
        cidr: &str,
        tag_prefix: &str,
        route_target: impl FnOnce(Resource) -> Resource,
    ) -> Result<Subnet, ConstructError> {
        let tag = format!("{}/{}", tag_prefix, name.trim_start_matches(self.id.as_str()));
        stack.add(
            Resource::new("ec2.subnet", name)
                .with_attribute("vpc_id", Value::reference(&self.id))
                .with_attribute("cidr_block", cidr)
                .with_attribute("availability_zone", zone)
                .with_attribute("map_public_ip_on_launch", subnet_type == SubnetType::Public)
                .with_attribute("tags", name_tag(&tag)),
        )?;

        let route_table = format!("{}RouteTable", name);
        stack.add(
            Resource::new("ec2.route_table", &route_table)
                .with_attribute("vpc_id", Value::reference(&self.id))
                .with_attribute("tags", name_tag(&tag)),
        )?;
        stack.add(
            Resource::new("ec2.subnet_route_table_association", format!("{}RouteTableAssociation", name))
                .with_attribute("route_table_id", Value::reference(&route_table))
                .with_attribute("subnet_id", Value::reference(name)),
        )?;

        let default_route = format!("{}DefaultRoute", name);
        stack.add(route_target(
            Resource::new("ec2.route", &default_route)
                .with_attribute("route_table_id", Value::reference(&route_table))
                .with_attribute("destination_cidr_block", "0.0.0.0/0"),
        ))?;

        let subnet = Subnet {
            logical_id: name.to_string(),
            subnet_type,
            availability_zone: zone.to_string(),
            cidr: cidr.to_string(),
            route_table,
            default_route,
        };
        self.subnets.push(subnet.clone());
        Ok(subnet)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn cidr(&self) -> &str {
        &self.cidr
    }

    pub fn vpc_ref(&self) -> Value {
        Value::reference(&self.id)
    }

    pub fn internet_gateway(&self) -> &str {
        &self.internet_gateway
    }

    pub fn nat_gateways(&self) -> &[String] {
        &self.nat_gateways
    }

    pub fn subnets(&self) -> &[Subnet] {
        &self.subnets
    }

    pub fn select_subnets(&self, subnet_type: SubnetType) -> Vec<&Subnet> {
        self.subnets
            .iter()
            .filter(|s| s.subnet_type == subnet_type)
            .collect()
    }

    /// References to the selected subnets, as a list value
    pub fn subnet_refs(&self, subnet_type: SubnetType) -> Value {
        Value::List(
            self.select_subnets(subnet_type)
                .into_iter()
                .map(Subnet::subnet_ref)
                .collect(),
        )
    }
}

fn parse_cidr(cidr: &str) -> Result<(u32, u8), String> {
    validate_cidr(cidr)?;
    let (ip, prefix) = cidr
        .split_once('/')
        .ok_or_else(|| format!("Invalid CIDR '{}'", cidr))?;
    let ip: Ipv4Addr = ip.parse().map_err(|e| format!("Invalid CIDR '{}': {}", cidr, e))?;
    let prefix: u8 = prefix.parse().map_err(|e| format!("Invalid CIDR '{}': {}", cidr, e))?;

    let network = u32::from(ip);
    let mask = if prefix == 0 { 0 } else { u32::MAX << (32 - prefix) };
    if network & !mask != 0 {
        return Err(format!("CIDR '{}' has host bits set", cidr));
    }
    Ok((network, prefix))
}

/// Carve a network into `count` equal blocks, rounded up to a power of two
fn split_cidr(network: u32, prefix: u8, count: usize) -> Result<Vec<String>, String> {
    let bits = count.next_power_of_two().trailing_zeros() as u8;
    let new_prefix = prefix + bits;
    if new_prefix > MAX_SUBNET_PREFIX {
        return Err(format!(
            "/{} is too small for {} subnets",
            prefix, count
        ));
    }
    let size = 1u32 << (32 - new_prefix);
    Ok((0..count as u32)
        .map(|i| format!("{}/{}", Ipv4Addr::from(network + i * size), new_prefix))
        .collect())
}
