#![allow(dead_code)]

use catalog_gate::{
    Bootstrap, Credential, CredentialHash, CredentialHasher, Handle, MemoryStore, MembershipGraph,
    Principal, Principals, ProfileAttrs, RoleName,
};
use futures::executor::block_on;

/// Deterministic hasher; the crate's argon2 hasher is too slow for test loops.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainHasher;

impl CredentialHasher for PlainHasher {
    fn hash(&self, credential: &Credential) -> catalog_gate::Result<CredentialHash> {
        let digest: u64 = credential
            .expose()
            .iter()
            .fold(0xcbf2_9ce4_8422_2325, |acc, byte| {
                (acc ^ u64::from(*byte)).wrapping_mul(0x0100_0000_01b3)
            });
        Ok(CredentialHash::from_string(format!("fnv${digest:016x}")))
    }

    fn verify(&self, credential: &Credential, hash: &CredentialHash) -> catalog_gate::Result<bool> {
        Ok(&self.hash(credential)? == hash)
    }
}

/// Store seeded with the library roles.
pub fn seeded_store() -> MemoryStore {
    let store = MemoryStore::new();
    block_on(Bootstrap::library().run(&store)).unwrap();
    store
}

pub fn principals(store: &MemoryStore) -> Principals<MemoryStore, PlainHasher> {
    Principals::new(store.clone(), PlainHasher)
}

pub fn register(store: &MemoryStore, handle: &str) -> Principal {
    block_on(principals(store).register(
        Handle::try_from(handle).unwrap(),
        Credential::new(format!("{handle}-secret")).unwrap(),
        ProfileAttrs::default(),
    ))
    .unwrap()
}

pub fn register_with_roles(store: &MemoryStore, handle: &str, roles: &[&str]) -> Principal {
    let principal = register(store, handle);
    let graph = MembershipGraph::new(store.clone());
    for role in roles {
        block_on(graph.assign(&principal.id, &RoleName::try_from(*role).unwrap())).unwrap();
    }
    principal
}
