#![allow(non_upper_case_globals)]

use crate::node::Value;
use crate::op_kind::OpKind;

pub mod all_reduce;
pub mod device_data;
pub mod token;

pub use all_reduce::AllReduce;
pub use device_data::DeviceData;
pub use token::Token;

lazy_static::lazy_static! {
    pub static ref xla_cross_replica_sum: OpKind = OpKind::new("xla", "cross_replica_sum");
    pub static ref xla_device_data: OpKind = OpKind::new("xla", "device_data");
    pub static ref xla_create_token: OpKind = OpKind::new("xla", "create_token");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AllReduceType {
    Sum,
    Mul,
    And,
    Or,
    Min,
    Max,
}

impl AllReduceType {
    pub fn value(&self) -> u32 {
        match self {
            AllReduceType::Sum => 0,
            AllReduceType::Mul => 1,
            AllReduceType::And => 2,
            AllReduceType::Or => 3,
            AllReduceType::Min => 4,
            AllReduceType::Max => 5,
        }
    }
}

impl core::fmt::Display for AllReduceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            AllReduceType::Sum => "sum",
            AllReduceType::Mul => "mul",
            AllReduceType::And => "and",
            AllReduceType::Or => "or",
            AllReduceType::Min => "min",
            AllReduceType::Max => "max",
        };
        write!(f, "{name}")
    }
}

/// `operands` followed by `token`.
pub fn operand_list_with_token(operands: &[Value], token: &Value) -> Vec<Value> {
    let mut list = Vec::with_capacity(operands.len() + 1);
    list.extend_from_slice(operands);
    list.push(token.clone());
    list
}
