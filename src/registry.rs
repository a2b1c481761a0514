//! Method registry: an open-addressing hash table keyed by method name

use std::{fmt, mem, sync::Arc};

use serde_json::Value;
use tracing::debug;

use crate::{
    errors::RpcError,
    hooks::{self, MemoryHooks},
    rpc::context::{CallContext, Procedure, UserArg},
};

pub const DEFAULT_CAPACITY: usize = 16;
const MIN_CAPACITY: usize = 4;

const LOAD_NUM: usize = 3;
const LOAD_DEN: usize = 4;

pub struct Method {
    name: String,
    procedure: Box<Procedure>,
    arg: Option<UserArg>,
}

impl Method {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arg(&self) -> Option<&(dyn std::any::Any + Send + Sync)> {
        self.arg.as_deref()
    }

    pub fn invoke(
        &self,
        ctx: &mut CallContext<'_>,
        params: Option<&Value>,
        id: Option<&Value>,
    ) -> Value {
        (self.procedure)(ctx, params, id)
    }
}

impl fmt::Debug for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Method")
            .field("name", &self.name)
            .field("has_arg", &self.arg.is_some())
            .finish()
    }
}

#[derive(Debug, Default)]
enum Slot {
    #[default]
    Empty,
    Occupied(Method),
    Tombstone,
}

enum Probe {
    Existing(usize),
    Vacant(usize),
    Exhausted,
}

pub struct MethodRegistry {
    slots: Vec<Slot>,
    len: usize,
    tombstones: usize,
    hooks: Arc<dyn MemoryHooks>,
}

impl fmt::Debug for MethodRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodRegistry")
            .field("len", &self.len)
            .field("capacity", &self.slots.len())
            .field("tombstones", &self.tombstones)
            .finish()
    }
}

impl MethodRegistry {
    pub fn new(initial_capacity: usize) -> Result<Self, RpcError> {
        Self::with_hooks(initial_capacity, hooks::current())
    }

    pub fn with_hooks(
        initial_capacity: usize,
        hooks: Arc<dyn MemoryHooks>,
    ) -> Result<Self, RpcError> {
        let capacity = normalize_capacity(initial_capacity);
        let slots = allocate_table(hooks.as_ref(), capacity)?;
        Ok(Self {
            slots,
            len: 0,
            tombstones: 0,
            hooks,
        })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn hooks(&self) -> &Arc<dyn MemoryHooks> {
        &self.hooks
    }

    pub fn add<F>(&mut self, name: &str, procedure: F, arg: Option<UserArg>) -> Result<(), RpcError>
    where
        F: Fn(&mut CallContext<'_>, Option<&Value>, Option<&Value>) -> Value
            + Send
            + Sync
            + 'static,
    {
        self.add_boxed(name, Box::new(procedure), arg)
    }

    pub fn add_boxed(
        &mut self,
        name: &str,
        procedure: Box<Procedure>,
        arg: Option<UserArg>,
    ) -> Result<(), RpcError> {
        if let Probe::Existing(index) = self.probe(name) {
            if let Slot::Occupied(method) = &mut self.slots[index] {
                method.procedure = procedure;
                method.arg = arg;
                debug!(method = %name, "replaced registered method");
                return Ok(());
            }
        }

        if exceeds_load(self.len + 1, self.slots.len()) {
            self.rehash(self.slots.len() * 2)?;
        } else if exceeds_load(self.len + self.tombstones + 1, self.slots.len()) {
            self.rehash(self.slots.len())?;
        }

        let index = match self.probe(name) {
            Probe::Vacant(index) => index,
            Probe::Existing(_) | Probe::Exhausted => {
                crate::logging::report_error("no vacant slot after rehash");
                return Err(RpcError::AllocationFailed);
            }
        };

        let name = hooks::duplicate(self.hooks.as_ref(), name)?;
        if matches!(self.slots[index], Slot::Tombstone) {
            self.tombstones -= 1;
        }
        debug!(method = %name, slot = index, "registered method");
        self.slots[index] = Slot::Occupied(Method {
            name,
            procedure,
            arg,
        });
        self.len += 1;
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> Result<(), RpcError> {
        let Probe::Existing(index) = self.probe(name) else {
            return Err(RpcError::NotFound(name.to_string()));
        };

        let Slot::Occupied(method) = mem::replace(&mut self.slots[index], Slot::Tombstone) else {
            return Err(RpcError::NotFound(name.to_string()));
        };
        self.len -= 1;
        self.tombstones += 1;
        debug!(method = %name, "removed method");
        self.release_method(method);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Method> {
        match self.probe(name) {
            Probe::Existing(index) => match &self.slots[index] {
                Slot::Occupied(method) => Some(method),
                _ => None,
            },
            Probe::Vacant(_) | Probe::Exhausted => None,
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn for_each<V>(&self, mut visitor: V)
    where
        V: FnMut(&str, Option<&(dyn std::any::Any + Send + Sync)>),
    {
        for method in self.iter() {
            visitor(method.name(), method.arg());
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Method> {
        self.slots.iter().filter_map(|slot| match slot {
            Slot::Occupied(method) => Some(method),
            _ => None,
        })
    }

    // Inserts reuse the first tombstone only once the chain ends without a match.
    fn probe(&self, name: &str) -> Probe {
        let capacity = self.slots.len();
        let mut index = primary_hash(name) % capacity;
        let step = step_hash(name, capacity);
        let mut first_tombstone = None;

        for _ in 0..capacity {
            match &self.slots[index] {
                Slot::Empty => return Probe::Vacant(first_tombstone.unwrap_or(index)),
                Slot::Tombstone => {
                    first_tombstone.get_or_insert(index);
                }
                Slot::Occupied(method) if method.name == name => return Probe::Existing(index),
                Slot::Occupied(_) => {}
            }
            index = (index + step) % capacity;
        }

        first_tombstone.map_or(Probe::Exhausted, Probe::Vacant)
    }

    fn rehash(&mut self, capacity: usize) -> Result<(), RpcError> {
        let mut fresh = allocate_table(self.hooks.as_ref(), capacity)?;
        let claimed = self
            .iter()
            .map(|method| claim_slot(&mut fresh, &method.name))
            .collect::<Option<Vec<usize>>>();
        let Some(targets) = claimed else {
            self.hooks.release(table_bytes(capacity));
            crate::logging::report_error("rehash ran out of free slots");
            return Err(RpcError::AllocationFailed);
        };

        let old = mem::replace(&mut self.slots, fresh);
        let old_capacity = old.len();
        let methods = old.into_iter().filter_map(|slot| match slot {
            Slot::Occupied(method) => Some(method),
            _ => None,
        });
        for (method, index) in methods.zip(targets) {
            self.slots[index] = Slot::Occupied(method);
        }
        self.tombstones = 0;

        self.hooks.release(table_bytes(old_capacity));
        debug!(
            from = old_capacity,
            to = capacity,
            methods = self.len,
            "rehashed method registry"
        );
        Ok(())
    }

    fn release_method(&self, method: Method) {
        let Method { name, arg, .. } = method;
        hooks::release_string(self.hooks.as_ref(), name);
        drop(arg);
    }
}

impl Drop for MethodRegistry {
    fn drop(&mut self) {
        let capacity = self.slots.len();
        for slot in mem::take(&mut self.slots) {
            if let Slot::Occupied(method) = slot {
                self.release_method(method);
            }
        }
        self.hooks.release(table_bytes(capacity));
    }
}

// Mark the first empty slot on `name`'s probe path until the method moves in.
fn claim_slot(slots: &mut [Slot], name: &str) -> Option<usize> {
    let capacity = slots.len();
    let mut index = primary_hash(name) % capacity;
    let step = step_hash(name, capacity);
    for _ in 0..capacity {
        if matches!(slots[index], Slot::Empty) {
            slots[index] = Slot::Tombstone;
            return Some(index);
        }
        index = (index + step) % capacity;
    }
    None
}

fn normalize_capacity(requested: usize) -> usize {
    if requested == 0 {
        return DEFAULT_CAPACITY;
    }
    requested.max(MIN_CAPACITY).next_power_of_two()
}

fn exceeds_load(count: usize, capacity: usize) -> bool {
    count * LOAD_DEN > capacity * LOAD_NUM
}

fn table_bytes(capacity: usize) -> usize {
    capacity * mem::size_of::<Slot>()
}

fn allocate_table(hooks: &dyn MemoryHooks, capacity: usize) -> Result<Vec<Slot>, RpcError> {
    if !hooks.allocate(table_bytes(capacity)) {
        crate::logging::report_error("method table allocation failed");
        return Err(RpcError::AllocationFailed);
    }

    let mut slots = Vec::new();
    if slots.try_reserve_exact(capacity).is_err() {
        hooks.release(table_bytes(capacity));
        crate::logging::report_error("method table allocation failed");
        return Err(RpcError::AllocationFailed);
    }
    slots.resize_with(capacity, Slot::default);
    Ok(slots)
}

// djb2
fn primary_hash(name: &str) -> usize {
    name.bytes().fold(5381_usize, |hash, byte| {
        hash.wrapping_mul(33).wrapping_add(usize::from(byte))
    })
}

// sdbm, folded into an odd step in `[1, capacity - 1]`.
fn step_hash(name: &str, capacity: usize) -> usize {
    let hash = name.bytes().fold(0_usize, |hash, byte| {
        usize::from(byte)
            .wrapping_add(hash << 6)
            .wrapping_add(hash << 16)
            .wrapping_sub(hash)
    });
    (hash % (capacity - 1)) | 1
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;

    use super::*;
    use crate::{hooks::testing::CountingHooks, rpc::context::ParamsKind};

    fn echo(_ctx: &mut CallContext<'_>, _params: Option<&Value>, _id: Option<&Value>) -> Value {
        json!("echo")
    }

    fn other(_ctx: &mut CallContext<'_>, _params: Option<&Value>, _id: Option<&Value>) -> Value {
        json!("other")
    }

    fn call(registry: &MethodRegistry, name: &str) -> Option<Value> {
        let method = registry.get(name)?;
        let mut ctx = CallContext::new(method.arg(), ParamsKind::None);
        Some(method.invoke(&mut ctx, None, None))
    }

    struct DropCounter(Arc<AtomicUsize>);

    impl Drop for DropCounter {
        fn drop(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn add_lookup_remove_cycle() {
        let mut registry = MethodRegistry::new(8).expect("registry");
        registry.add("echo", echo, None).expect("add");
        assert_eq!(call(&registry, "echo"), Some(json!("echo")));

        registry.remove("echo").expect("remove");
        assert!(registry.get("echo").is_none());
        assert_eq!(
            registry.remove("echo"),
            Err(RpcError::NotFound("echo".to_string()))
        );
    }

    #[test]
    fn re_adding_replaces_without_growing() {
        let drops = Arc::new(AtomicUsize::new(0));
        let mut registry = MethodRegistry::new(8).expect("registry");
        registry
            .add("m", echo, Some(Box::new(DropCounter(drops.clone()))))
            .expect("add");
        registry.add("m", other, None).expect("replace");

        assert_eq!(registry.len(), 1);
        assert_eq!(drops.load(Ordering::SeqCst), 1);
        assert_eq!(call(&registry, "m"), Some(json!("other")));
    }

    #[test]
    fn growth_preserves_every_entry() {
        let mut registry = MethodRegistry::new(4).expect("registry");
        for i in 0..100 {
            registry.add(&format!("m{i}"), echo, None).expect("add");
        }

        assert_eq!(registry.len(), 100);
        assert!(registry.capacity() * 3 >= 100 * 4);
        for i in 0..100 {
            assert!(registry.contains(&format!("m{i}")), "m{i} missing");
        }
    }

    #[test]
    fn similar_names_collide_safely() {
        let names = ["ab", "ba", "aab", "abb", "abc", "bca", "cab"];
        let mut registry = MethodRegistry::new(4).expect("registry");
        for name in names {
            registry.add(name, echo, None).expect("add");
        }
        for name in names {
            assert!(registry.contains(name), "{name} missing");
        }
    }

    #[test]
    fn lookup_skips_tombstones_and_reuses_them() {
        let mut registry = MethodRegistry::new(4).expect("registry");
        registry.add("alpha", echo, None).expect("add alpha");
        registry.add("beta", other, None).expect("add beta");
        registry.remove("alpha").expect("remove alpha");

        assert_eq!(call(&registry, "beta"), Some(json!("other")));

        registry.add("alpha", echo, None).expect("re-add alpha");
        assert_eq!(registry.len(), 2);
        assert_eq!(call(&registry, "alpha"), Some(json!("echo")));
    }

    #[test]
    fn churn_does_not_grow_the_table() {
        let mut registry = MethodRegistry::new(8).expect("registry");
        for i in 0..1_000 {
            let name = format!("churn{i}");
            registry.add(&name, echo, None).expect("add");
            registry.remove(&name).expect("remove");
        }

        assert!(registry.is_empty());
        assert_eq!(registry.capacity(), 8);
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn miss_terminates_on_loaded_table() {
        let mut registry = MethodRegistry::new(4).expect("registry");
        for i in 0..30 {
            registry.add(&format!("method_{i}"), echo, None).expect("add");
        }
        assert!(registry.get("no_such_method").is_none());
        assert!(matches!(
            registry.remove("no_such_method"),
            Err(RpcError::NotFound(_))
        ));
    }

    #[test]
    fn unusual_names_are_plain_keys() {
        let long = "a".repeat(4096);
        let names = [
            "",
            "method with spaces",
            "method\twith\ttabs",
            "method/with/slashes",
            "\u{6d4b}\u{8bd5}",
            "\u{1f600}_method",
            long.as_str(),
        ];
        let mut registry = MethodRegistry::new(8).expect("registry");
        for name in names {
            registry.add(name, echo, None).expect("add");
        }
        for name in names {
            registry.remove(name).expect("remove");
        }
        assert!(registry.is_empty());
    }

    #[test]
    fn for_each_visits_occupied_slots_only() {
        let mut registry = MethodRegistry::new(8).expect("registry");
        registry.add("a", echo, Some(Box::new(1_u8))).expect("add a");
        registry.add("b", echo, None).expect("add b");
        registry.add("c", echo, None).expect("add c");
        registry.remove("b").expect("remove b");

        let mut seen = Vec::new();
        registry.for_each(|name, arg| seen.push((name.to_string(), arg.is_some())));
        seen.sort();

        assert_eq!(
            seen,
            vec![("a".to_string(), true), ("c".to_string(), false)]
        );
    }

    #[test]
    fn hook_traffic_balances_after_teardown() {
        let hooks = Arc::new(CountingHooks::default());
        {
            let mut registry =
                MethodRegistry::with_hooks(4, hooks.clone()).expect("registry");
            for i in 0..20 {
                registry.add(&format!("m{i}"), echo, None).expect("add");
            }
            registry.remove("m3").expect("remove");
            registry.add("m0", other, None).expect("replace");
            assert!(hooks.allocations() > 20);
        }
        assert_eq!(hooks.balance(), 0);
    }

    #[test]
    fn failed_growth_leaves_registry_usable() {
        let hooks = Arc::new(CountingHooks::default());
        let mut registry = MethodRegistry::with_hooks(4, hooks.clone()).expect("registry");
        registry.add("a", echo, None).expect("add a");
        registry.add("b", echo, None).expect("add b");
        registry.add("c", echo, None).expect("add c");

        hooks.fail_from_now(true);
        assert_eq!(
            registry.add("d", echo, None),
            Err(RpcError::AllocationFailed)
        );
        assert_eq!(registry.len(), 3);
        assert_eq!(registry.capacity(), 4);
        assert!(registry.contains("a") && registry.contains("b") && registry.contains("c"));

        hooks.fail_from_now(false);
        registry.add("d", echo, None).expect("add after recovery");
        assert_eq!(registry.len(), 4);
        drop(registry);
        assert_eq!(hooks.balance(), 0);
    }

    #[test]
    fn creation_fails_without_memory() {
        let hooks = Arc::new(CountingHooks::default());
        hooks.fail_from_now(true);
        assert_eq!(
            MethodRegistry::with_hooks(0, hooks).err(),
            Some(RpcError::AllocationFailed)
        );
    }

    #[test]
    fn capacity_is_normalized() {
        assert_eq!(normalize_capacity(0), DEFAULT_CAPACITY);
        assert_eq!(normalize_capacity(1), 4);
        assert_eq!(normalize_capacity(5), 8);
        assert_eq!(normalize_capacity(16), 16);
    }

    #[test]
    fn step_hash_stays_in_range() {
        for capacity in [4, 8, 64, 1024] {
            for name in ["", "a", "method_17", "\u{1f600}"] {
                let step = step_hash(name, capacity);
                assert!(step >= 1 && step < capacity);
                assert_eq!(step % 2, 1);
            }
        }
    }

    #[test]
    fn claim_slot_gives_up_after_one_pass() {
        let mut slots: Vec<Slot> = (0..4).map(|_| Slot::default()).collect();
        let mut claimed: Vec<usize> = ["a", "b", "c", "d"]
            .into_iter()
            .map(|name| claim_slot(&mut slots, name).expect("free slot"))
            .collect();
        claimed.sort_unstable();
        assert_eq!(claimed, vec![0, 1, 2, 3]);
        assert!(slots.iter().all(|slot| matches!(slot, Slot::Tombstone)));

        assert_eq!(claim_slot(&mut slots, "e"), None);
    }

    #[test]
    fn rehash_keeps_every_method_reachable() {
        let mut registry = MethodRegistry::new(4).expect("registry");
        for i in 0..40 {
            registry.add(&format!("m{i}"), echo, None).expect("add");
            if i % 3 == 0 {
                registry.remove(&format!("m{i}")).expect("remove");
            }
        }
        for i in 0..40 {
            assert_eq!(registry.contains(&format!("m{i}")), i % 3 != 0);
        }
        assert_eq!(registry.iter().count(), registry.len());
    }
}
