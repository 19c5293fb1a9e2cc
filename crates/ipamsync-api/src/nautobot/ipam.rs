// Nautobot IPAM endpoints: prefixes and IP addresses

use uuid::Uuid;

use super::client::NautobotClient;
use super::models::{IpAddress, IpAddressWrite, Page, Prefix, PrefixWrite};
use crate::error::Error;

impl NautobotClient {
    // ── Prefixes ─────────────────────────────────────────────────────

    pub async fn list_prefixes(&self, offset: u64, limit: u32) -> Result<Page<Prefix>, Error> {
        self.get_with_params(
            "ipam/prefixes/",
            &[
                ("offset", offset.to_string()),
                ("limit", limit.to_string()),
                ("depth", "1".into()),
            ],
        )
        .await
    }

    /// Every prefix in the store, all pages drained.
    pub async fn all_prefixes(&self, page_size: u32) -> Result<Vec<Prefix>, Error> {
        self.paginate_all(page_size, |offset, limit| self.list_prefixes(offset, limit))
            .await
    }

    pub async fn get_prefix(&self, id: &Uuid) -> Result<Prefix, Error> {
        self.get_with_params(&format!("ipam/prefixes/{id}/"), &[("depth", "1".into())])
            .await
    }

    pub async fn create_prefix(&self, body: &PrefixWrite) -> Result<Prefix, Error> {
        self.post("ipam/prefixes/", body).await
    }

    pub async fn update_prefix(&self, id: &Uuid, body: &PrefixWrite) -> Result<Prefix, Error> {
        self.patch(&format!("ipam/prefixes/{id}/"), body).await
    }

    pub async fn delete_prefix(&self, id: &Uuid) -> Result<(), Error> {
        self.delete(&format!("ipam/prefixes/{id}/")).await
    }

    // ── IP addresses ─────────────────────────────────────────────────

    pub async fn list_ip_addresses(
        &self,
        offset: u64,
        limit: u32,
    ) -> Result<Page<IpAddress>, Error> {
        self.get_with_params(
            "ipam/ip-addresses/",
            &[
                ("offset", offset.to_string()),
                ("limit", limit.to_string()),
                ("depth", "1".into()),
            ],
        )
        .await
    }

    pub async fn all_ip_addresses(&self, page_size: u32) -> Result<Vec<IpAddress>, Error> {
        self.paginate_all(page_size, |offset, limit| {
            self.list_ip_addresses(offset, limit)
        })
        .await
    }

    pub async fn get_ip_address(&self, id: &Uuid) -> Result<IpAddress, Error> {
        self.get_with_params(
            &format!("ipam/ip-addresses/{id}/"),
            &[("depth", "1".into())],
        )
        .await
    }

    pub async fn create_ip_address(&self, body: &IpAddressWrite) -> Result<IpAddress, Error> {
        self.post("ipam/ip-addresses/", body).await
    }

    pub async fn update_ip_address(
        &self,
        id: &Uuid,
        body: &IpAddressWrite,
    ) -> Result<IpAddress, Error> {
        self.patch(&format!("ipam/ip-addresses/{id}/"), body).await
    }

    pub async fn delete_ip_address(&self, id: &Uuid) -> Result<(), Error> {
        self.delete(&format!("ipam/ip-addresses/{id}/")).await
    }
}
