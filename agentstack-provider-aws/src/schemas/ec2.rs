//! EC2 networking resource schema definitions

use agentstack_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};

use super::AwsSchemaConfig;
use super::types as aws_types;

/// Instance tenancy for a VPC
pub fn instance_tenancy() -> AttributeType {
    AttributeType::Enum(vec![
        "default".to_string(),
        "dedicated".to_string(),
        "host".to_string(),
    ])
}

/// Returns the schema for VPC
pub fn vpc_schema() -> ResourceSchema {
    ResourceSchema::new("ec2.vpc")
        .with_description("An AWS VPC (Virtual Private Cloud)")
        .attribute(
            AttributeSchema::new("cidr_block", types::cidr())
                .required()
                .with_description("The IPv4 network range for the VPC, in CIDR notation"),
        )
        .attribute(
            AttributeSchema::new("enable_dns_support", AttributeType::Bool)
                .with_description("Enable DNS resolution through the Amazon provided DNS server"),
        )
        .attribute(
            AttributeSchema::new("enable_dns_hostnames", AttributeType::Bool)
                .with_description("Enable DNS hostnames for instances in the VPC"),
        )
        .attribute(
            AttributeSchema::new("instance_tenancy", instance_tenancy())
                .with_description("The allowed tenancy of instances launched into the VPC"),
        )
        .attribute(AttributeSchema::new("tags", aws_types::tags()))
}

/// Returns the schema for Subnet
pub fn subnet_schema() -> ResourceSchema {
    ResourceSchema::new("ec2.subnet")
        .with_description("A subnet in an AWS VPC")
        .attribute(
            AttributeSchema::new("vpc_id", AttributeType::String)
                .required()
                .with_description("VPC ID for the subnet"),
        )
        .attribute(
            AttributeSchema::new("cidr_block", types::cidr())
                .required()
                .with_description("The IPv4 CIDR block for the subnet"),
        )
        .attribute(
            AttributeSchema::new("availability_zone", aws_types::availability_zone())
                .required()
                .with_description("The availability zone for the subnet"),
        )
        .attribute(
            AttributeSchema::new("map_public_ip_on_launch", AttributeType::Bool)
                .with_description("Assign a public IPv4 address to network interfaces created in this subnet"),
        )
        .attribute(AttributeSchema::new("tags", aws_types::tags()))
}

/// Returns the schema for Internet Gateway
pub fn internet_gateway_schema() -> ResourceSchema {
    ResourceSchema::new("ec2.internet_gateway")
        .with_description("An AWS Internet Gateway")
        .attribute(AttributeSchema::new("tags", aws_types::tags()))
}

/// Returns the schema for VPC Gateway Attachment
pub fn vpc_gateway_attachment_schema() -> ResourceSchema {
    ResourceSchema::new("ec2.vpc_gateway_attachment")
        .with_description("Attaches an Internet Gateway to a VPC")
        .attribute(AttributeSchema::new("vpc_id", AttributeType::String).required())
        .attribute(AttributeSchema::new("internet_gateway_id", AttributeType::String).required())
}

/// Returns the schema for Route Table
pub fn route_table_schema() -> ResourceSchema {
    ResourceSchema::new("ec2.route_table")
        .with_description("An AWS VPC Route Table")
        .attribute(
            AttributeSchema::new("vpc_id", AttributeType::String)
                .required()
                .with_description("VPC ID for the Route Table"),
        )
        .attribute(AttributeSchema::new("tags", aws_types::tags()))
}

/// Returns the schema for Subnet Route Table Association
pub fn subnet_route_table_association_schema() -> ResourceSchema {
    ResourceSchema::new("ec2.subnet_route_table_association")
        .with_description("Associates a subnet with a route table")
        .attribute(AttributeSchema::new("route_table_id", AttributeType::String).required())
        .attribute(AttributeSchema::new("subnet_id", AttributeType::String).required())
}

/// Returns the schema for Route
pub fn route_schema() -> ResourceSchema {
    ResourceSchema::new("ec2.route")
        .with_description("A route in an AWS VPC Route Table")
        .attribute(
            AttributeSchema::new("route_table_id", AttributeType::String)
                .required()
                .with_description("Route Table ID"),
        )
        .attribute(
            AttributeSchema::new("destination_cidr_block", types::cidr())
                .required()
                .with_description("Destination CIDR block"),
        )
        .attribute(
            AttributeSchema::new("gateway_id", AttributeType::String)
                .with_description("Internet Gateway ID (for internet-bound traffic)"),
        )
        .attribute(
            AttributeSchema::new("nat_gateway_id", AttributeType::String)
                .with_description("NAT Gateway ID"),
        )
}

/// Returns the schema for Elastic IP
pub fn eip_schema() -> ResourceSchema {
    ResourceSchema::new("ec2.eip")
        .with_description("An Elastic IP address")
        .attribute(
            AttributeSchema::new(
                "domain",
                AttributeType::Enum(vec!["vpc".to_string(), "standard".to_string()]),
            )
            .with_description("Whether the address is for use in a VPC"),
        )
        .attribute(AttributeSchema::new("tags", aws_types::tags()))
}

/// Returns the schema for NAT Gateway
pub fn nat_gateway_schema() -> ResourceSchema {
    ResourceSchema::new("ec2.nat_gateway")
        .with_description("A NAT gateway giving private subnets outbound internet access")
        .attribute(
            AttributeSchema::new("subnet_id", AttributeType::String)
                .required()
                .with_description("Public subnet the NAT gateway is placed in"),
        )
        .attribute(
            AttributeSchema::new("allocation_id", AttributeType::String)
                .with_description("Allocation ID of the Elastic IP address"),
        )
        .attribute(AttributeSchema::new(
            "connectivity_type",
            AttributeType::Enum(vec!["public".to_string(), "private".to_string()]),
        ))
        .attribute(AttributeSchema::new("tags", aws_types::tags()))
}

fn egress_rule() -> AttributeType {
    AttributeType::Struct {
        name: "Egress".to_string(),
        fields: vec![
            AttributeSchema::new("cidr_ip", types::cidr()),
            AttributeSchema::new("ip_protocol", aws_types::ip_protocol()).required(),
            AttributeSchema::new("from_port", types::port_number()),
            AttributeSchema::new("to_port", types::port_number()),
            AttributeSchema::new("description", AttributeType::String),
        ],
    }
}

/// Returns the schema for Security Group
pub fn security_group_schema() -> ResourceSchema {
    ResourceSchema::new("ec2.security_group")
        .with_description("An AWS VPC Security Group")
        .attribute(
            AttributeSchema::new("description", AttributeType::String)
                .required()
                .with_provider_name("GroupDescription")
                .with_description("Description of the Security Group"),
        )
        .attribute(
            AttributeSchema::new("vpc_id", AttributeType::String)
                .required()
                .with_description("VPC ID for the Security Group"),
        )
        .attribute(
            AttributeSchema::new(
                "security_group_egress",
                AttributeType::List(Box::new(egress_rule())),
            )
            .with_description("Outbound rules"),
        )
        .attribute(AttributeSchema::new("tags", aws_types::tags()))
}

/// Returns the schema for Security Group Ingress
pub fn security_group_ingress_schema() -> ResourceSchema {
    ResourceSchema::new("ec2.security_group_ingress")
        .with_description("An inbound rule for an AWS VPC Security Group")
        .attribute(
            AttributeSchema::new("group_id", AttributeType::String)
                .required()
                .with_description("Security Group ID the rule belongs to"),
        )
        .attribute(
            AttributeSchema::new("ip_protocol", aws_types::ip_protocol())
                .required()
                .with_description("Protocol (tcp, udp, icmp, or -1 for all)"),
        )
        .attribute(
            AttributeSchema::new("from_port", types::port_number())
                .with_description("Start of port range"),
        )
        .attribute(
            AttributeSchema::new("to_port", types::port_number())
                .with_description("End of port range"),
        )
        .attribute(
            AttributeSchema::new("cidr_ip", types::cidr())
                .with_description("IPv4 range allowed in"),
        )
        .attribute(
            AttributeSchema::new("source_security_group_id", AttributeType::String)
                .with_description("Security Group allowed in"),
        )
        .attribute(AttributeSchema::new("description", AttributeType::String))
}

/// Returns all EC2 configs
pub fn configs() -> Vec<AwsSchemaConfig> {
    vec![
        AwsSchemaConfig::new("AWS::EC2::VPC", vpc_schema()),
        AwsSchemaConfig::new("AWS::EC2::Subnet", subnet_schema()),
        AwsSchemaConfig::new("AWS::EC2::InternetGateway", internet_gateway_schema()),
        AwsSchemaConfig::new("AWS::EC2::VPCGatewayAttachment", vpc_gateway_attachment_schema()),
        AwsSchemaConfig::new("AWS::EC2::RouteTable", route_table_schema()),
        AwsSchemaConfig::new(
            "AWS::EC2::SubnetRouteTableAssociation",
            subnet_route_table_association_schema(),
        ),
        AwsSchemaConfig::new("AWS::EC2::Route", route_schema()),
        AwsSchemaConfig::new("AWS::EC2::EIP", eip_schema()),
        AwsSchemaConfig::new("AWS::EC2::NatGateway", nat_gateway_schema()),
        AwsSchemaConfig::new("AWS::EC2::SecurityGroup", security_group_schema()),
        AwsSchemaConfig::new("AWS::EC2::SecurityGroupIngress", security_group_ingress_schema()),
    ]
}
