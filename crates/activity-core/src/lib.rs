mod token;
mod task;
mod failure;
mod error;

pub use token::{TaskToken, TOKEN_TIP_LEN};
pub use task::{Task, TaskInput};
pub use failure::TaskFailure;
pub use error::{BrokerError, Result};
