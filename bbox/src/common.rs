pub use anyhow::{ensure, format_err, Error, Result};
pub use num_traits::{Float, Num, NumCast, ToPrimitive};
pub use serde::{Deserialize, Serialize};
pub use std::{
    fmt,
    ops::Mul,
    str::FromStr,
};
