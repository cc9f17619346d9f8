//! Unary RPC dispatch.
//!
//! # Responsibilities
//! - Check the request message against the resolved method's input type
//! - Invoke the method over a pooled connection
//! - Propagate caller cancellation and the optional per-call deadline
//!
//! No retries here: backend errors are returned verbatim.

use std::time::Duration;

use prost_reflect::{DynamicMessage, ReflectMessage};
use tokio_util::sync::CancellationToken;

use crate::error::{GatewayError, GatewayResult};
use crate::pool::RpcConnection;
use crate::schema::ResolvedMethod;

#[derive(Debug, Clone, Default)]
pub struct Dispatcher {
    timeout: Option<Duration>,
}

impl Dispatcher {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub async fn dispatch(
        &self,
        cancel: &CancellationToken,
        conn: &dyn RpcConnection,
        method: &ResolvedMethod,
        request: DynamicMessage,
    ) -> GatewayResult<DynamicMessage> {
        let expected = method.input();
        if request.descriptor() != expected {
            return Err(GatewayError::Conversion(format!(
                "request type {} does not match {} input {}",
                request.descriptor().full_name(),
                method.full_name(),
                expected.full_name()
            )));
        }

        let call = async {
            match self.timeout {
                Some(limit) => tokio::time::timeout(limit, conn.invoke(method, request))
                    .await
                    .map_err(|_| GatewayError::Timeout(limit))?
                    .map_err(GatewayError::Dispatch),
                None => conn.invoke(method, request).await.map_err(GatewayError::Dispatch),
            }
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(GatewayError::Cancelled),
            result = call => result,
        }
    }
}
