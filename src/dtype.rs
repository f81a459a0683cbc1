#![allow(non_upper_case_globals)]

/// Element type of an array shape.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub struct Dtype {
    pub size: usize,
    pub type_name: &'static str,
}

impl core::fmt::Display for Dtype {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.type_name)
    }
}

impl Dtype {
    pub fn is_token(&self) -> bool {
        *self == token
    }
}

pub const pred: Dtype = Dtype {
    size: std::mem::size_of::<bool>(),
    type_name: "pred",
};

pub const float16: Dtype = Dtype {
    size: std::mem::size_of::<half::f16>(),
    type_name: "f16",
};

pub const bfloat16: Dtype = Dtype {
    size: std::mem::size_of::<half::bf16>(),
    type_name: "bf16",
};

pub const float32: Dtype = Dtype {
    size: std::mem::size_of::<f32>(),
    type_name: "f32",
};

pub const float64: Dtype = Dtype {
    size: std::mem::size_of::<f64>(),
    type_name: "f64",
};

pub const int8: Dtype = Dtype {
    size: std::mem::size_of::<i8>(),
    type_name: "s8",
};

pub const int16: Dtype = Dtype {
    size: std::mem::size_of::<i16>(),
    type_name: "s16",
};

pub const int32: Dtype = Dtype {
    size: std::mem::size_of::<i32>(),
    type_name: "s32",
};

pub const int64: Dtype = Dtype {
    size: std::mem::size_of::<i64>(),
    type_name: "s64",
};

pub const uint8: Dtype = Dtype {
    size: std::mem::size_of::<u8>(),
    type_name: "u8",
};

pub const uint16: Dtype = Dtype {
    size: std::mem::size_of::<u16>(),
    type_name: "u16",
};

pub const uint32: Dtype = Dtype {
    size: std::mem::size_of::<u32>(),
    type_name: "u32",
};

pub const uint64: Dtype = Dtype {
    size: std::mem::size_of::<u64>(),
    type_name: "u64",
};

/// Ordering token. Carries no data.
pub const token: Dtype = Dtype {
    size: 0,
    type_name: "token",
};
