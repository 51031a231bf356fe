use dashmap::DashMap;

use crate::message::Recipient;

/// Live subscriber addresses with per-address subscription counts.
///
/// Several subscriptions may share one name, so an address stays live until
/// its last subscription is released.
#[derive(Debug, Default)]
pub struct AddressRegistry {
    live: DashMap<Recipient, usize>,
}

impl AddressRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, address: &Recipient) {
        *self.live.entry(address.clone()).or_insert(0) += 1;
    }

    pub fn release(&self, address: &Recipient) {
        let emptied = match self.live.get_mut(address) {
            Some(mut count) => {
                *count = count.saturating_sub(1);
                *count == 0
            }
            None => false,
        };
        if emptied {
            self.live.remove_if(address, |_, count| *count == 0);
        }
    }

    /// Whether an agent named `name` has at least one subscription
    pub fn is_live(&self, name: &str) -> bool {
        Recipient::agent(name).map_or(false, |address| self.live.contains_key(&address))
    }

    /// Subscriptions under `name`; `*` counts broadcast taps
    pub fn subscription_count(&self, name: &str) -> usize {
        name.parse::<Recipient>()
            .ok()
            .and_then(|address| self.live.get(&address).map(|count| *count))
            .unwrap_or(0)
    }

    /// Live agent names, sorted. Broadcast taps are not listed.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .live
            .iter()
            .filter_map(|e| match e.key() {
                Recipient::Agent(n) => Some(n.to_string()),
                Recipient::Broadcast => None,
            })
            .collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    pub fn clear(&self) {
        self.live.clear();
    }
}
