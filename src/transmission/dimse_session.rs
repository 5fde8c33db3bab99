use async_trait::async_trait;
use dimse::{DimseConfig, DimseScu, RemoteNode, StoreRequest, StoreSession};

use super::transport::{SessionTransport, StoreChannel, TransportError};

/// [`SessionTransport`] over a DIMSE association
pub struct DimseSessionTransport {
    scu: DimseScu,
}

impl DimseSessionTransport {
    pub fn new(config: DimseConfig) -> Self {
        Self {
            scu: DimseScu::new(config),
        }
    }

    /// C-ECHO the node and return its raw status
    pub async fn verify(&self, node: &RemoteNode) -> Result<u16, TransportError> {
        Ok(self.scu.echo(node).await?)
    }
}

#[async_trait]
impl SessionTransport for DimseSessionTransport {
    async fn open(
        &self,
        node: &RemoteNode,
        contexts: &[(String, String)],
    ) -> Result<Box<dyn StoreChannel>, TransportError> {
        let session = self.scu.open_store(node, contexts).await?;
        Ok(Box::new(DimseChannel { session }))
    }
}

struct DimseChannel {
    session: StoreSession,
}

#[async_trait]
impl StoreChannel for DimseChannel {
    async fn store(&self, request: StoreRequest) -> Result<u16, TransportError> {
        Ok(self.session.store(request).await?)
    }

    async fn close(self: Box<Self>) -> Result<(), TransportError> {
        Ok(self.session.release().await?)
    }
}
