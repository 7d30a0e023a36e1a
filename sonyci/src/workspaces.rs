//! Workspace context and the workspace-scoped endpoints.
//!
//! Most Ci calls operate inside a workspace. The client keeps a default
//! workspace id, set from configuration or [`Client::set_workspace_id`],
//! plus a cached copy of the resolved [`Workspace`] record so repeated
//! lookups do not hit the network.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::client::Client;
use crate::error::{Error, ErrorKind};

/// A Ci workspace as returned by the workspaces listing. Fields the crate
/// does not model land in `extra`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workspace {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub network: Option<NetworkRef>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The network a workspace belongs to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkRef {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct ItemList<T> {
    items: Vec<T>,
}

fn items<T>(body: Value) -> Result<Vec<T>, Error>
where
    T: serde::de::DeserializeOwned,
{
    let list: ItemList<T> = serde_json::from_value(body).map_err(|source| {
        Error::with_source(
            ErrorKind::Other,
            "expected an item listing in the response",
            source,
        )
    })?;
    Ok(list.items)
}

impl Client {
    /// The default workspace id, if one is configured.
    pub fn workspace_id(&self) -> Option<&str> {
        self.workspace_id.as_deref()
    }

    /// Change the default workspace. Drops the cached workspace record
    /// and the cached access token.
    pub fn set_workspace_id(&mut self, workspace_id: impl Into<String>) {
        self.workspace_id = Some(workspace_id.into());
        self.workspace = None;
        self.invalidate_access_token();
    }

    /// Unset the default workspace, dropping the same caches as
    /// [`Client::set_workspace_id`].
    pub fn clear_workspace_id(&mut self) {
        self.workspace_id = None;
        self.workspace = None;
        self.invalidate_access_token();
    }

    /// Resolve the default workspace to its full record.
    ///
    /// Errors when no default workspace id is configured. Returns
    /// `Ok(None)` when the listing succeeds but holds no workspace with
    /// that id. The resolved record is cached until the id changes.
    pub async fn workspace(&mut self) -> Result<Option<Workspace>, Error> {
        let Some(id) = self.workspace_id.clone() else {
            return Err(Error::new(
                ErrorKind::Other,
                "no workspace id is configured; call set_workspace_id first",
            ));
        };

        if let Some(workspace) = &self.workspace {
            return Ok(Some(workspace.clone()));
        }

        tracing::debug!("resolving workspace {}", id);
        let all = self.workspaces(&()).await?;
        let found = all.into_iter().find(|workspace| workspace.id == id);
        self.workspace = found.clone();
        Ok(found)
    }

    /// List the workspaces visible to the authenticated account.
    pub async fn workspaces<P>(&mut self, params: &P) -> Result<Vec<Workspace>, Error>
    where
        P: Serialize + ?Sized,
    {
        let body = self.get("/workspaces", params).await?;
        items(body)
    }

    /// Search a workspace's assets. `workspace_id` falls back to the
    /// default workspace when `None`.
    pub async fn workspace_search<P>(
        &mut self,
        workspace_id: Option<&str>,
        params: &P,
    ) -> Result<Vec<Value>, Error>
    where
        P: Serialize + ?Sized,
    {
        let id = self.require_workspace_id(workspace_id)?;
        let body = self
            .get(&format!("/workspaces/{id}/search"), params)
            .await?;
        items(body)
    }

    /// List a workspace's contents. `workspace_id` falls back to the
    /// default workspace when `None`.
    pub async fn workspace_contents<P>(
        &mut self,
        workspace_id: Option<&str>,
        params: &P,
    ) -> Result<Vec<Value>, Error>
    where
        P: Serialize + ?Sized,
    {
        let id = self.require_workspace_id(workspace_id)?;
        let body = self
            .get(&format!("/workspaces/{id}/contents"), params)
            .await?;
        items(body)
    }

    /// List the webhooks registered on the default workspace's network.
    pub async fn webhooks<P>(&mut self, params: &P) -> Result<Vec<Value>, Error>
    where
        P: Serialize + ?Sized,
    {
        let workspace = self.workspace().await?.ok_or_else(|| {
            Error::new(
                ErrorKind::Other,
                "the default workspace was not found on the server",
            )
        })?;
        let network = workspace.network.ok_or_else(|| {
            Error::new(ErrorKind::Other, "the workspace is not part of a network")
        })?;

        let body = self
            .get(&format!("/networks/{}/webhooks", network.id), params)
            .await?;
        items(body)
    }

    fn require_workspace_id(&self, given: Option<&str>) -> Result<String, Error> {
        given
            .map(str::to_string)
            .or_else(|| self.workspace_id.clone())
            .ok_or_else(|| {
                Error::new(
                    ErrorKind::Other,
                    "no workspace id was given and none is configured",
                )
            })
    }
}
