//! Tree deletion: preview, idempotence, denial and re-creation races.

use reg_sweep::{
    delete_tree, Address, DeleteOptions, Key, MemoryStore, Node, Registry, TreeDeleter,
    ValueData,
};

fn addr(text: &str) -> Address {
    Address::parse(text).unwrap()
}

fn sample_tree() -> MemoryStore {
    let store = MemoryStore::new();
    store.set_value(&addr(r"HKCU\Old"), "Flag", ValueData::Dword(1)).unwrap();
    store.set_value(&addr(r"HKCU\Old\Cache"), "Size", ValueData::Qword(1 << 40)).unwrap();
    store.set_value(&addr(r"HKCU\Old\Cache"), r"C:\Temp\a.bin", ValueData::None).unwrap();
    store.create_key(&addr(r"HKCU\Old\Cache\Deep\Deeper")).unwrap();
    store.create_key(&addr(r"HKCU\Old\Empty")).unwrap();
    store.create_key(&addr(r"HKCU\Keep")).unwrap();
    store
}

fn old() -> Key {
    Key::container(addr(r"HKCU\Old")).unwrap()
}

#[test]
fn test_delete_tree_removes_everything() {
    let store = sample_tree();
    assert!(delete_tree(&store, &old(), false));

    assert!(!store.contains_key(&addr(r"HKCU\Old")));
    assert!(!store.contains_key(&addr(r"HKCU\Old\Cache\Deep\Deeper")));
    assert!(store.contains_key(&addr(r"HKCU\Keep")));
    assert_eq!(store.open_handles(), 0);
}

#[test]
fn test_children_deleted_before_parents() {
    let store = sample_tree();
    let report = TreeDeleter::new(&store).run(&old());
    assert!(report.success());

    let position = |text: &str| {
        report
            .deleted
            .iter()
            .position(|a| a == &addr(text))
            .unwrap_or_else(|| panic!("{} was not deleted", text))
    };
    assert!(position(r"HKCU\Old\Cache\Deep\Deeper") < position(r"HKCU\Old\Cache\Deep"));
    assert!(position(r"HKCU\Old\Cache\Deep") < position(r"HKCU\Old\Cache"));
    assert!(position(r"HKCU\Old\Cache\C:\Temp\a.bin") < position(r"HKCU\Old\Cache"));
    assert!(position(r"HKCU\Old\Cache") < position(r"HKCU\Old"));
    assert!(position(r"HKCU\Old\Flag") < position(r"HKCU\Old"));
    assert_eq!(report.deleted.last(), Some(&addr(r"HKCU\Old")));
}

#[test]
fn test_preview_never_mutates() {
    let store = sample_tree();
    let keys_before = store.key_count();

    assert!(delete_tree(&store, &old(), true));
    assert_eq!(store.mutation_count(), 0);
    assert_eq!(store.key_count(), keys_before);

    store.deny_write(&addr(r"HKCU\Old\Cache\Deep")).unwrap();
    let report = TreeDeleter::with_options(&store, DeleteOptions::new().preview(true)).run(&old());
    assert!(!report.success());
    assert!(report.preview);
    assert_eq!(report.passes, 1);
    assert!(report.failed.contains(&addr(r"HKCU\Old\Cache\Deep")));
    assert!(report.failed.contains(&addr(r"HKCU\Old")));
    assert_eq!(store.mutation_count(), 0);
    assert_eq!(store.key_count(), keys_before);
}

#[test]
fn test_preview_of_denied_entry() {
    let store = sample_tree();
    // Entries are removed through their parent key, so the parent's write right governs them.
    store.deny_write(&addr(r"HKCU\Old")).unwrap();
    let flag = Key::entry(addr(r"HKCU\Old\Flag")).unwrap();
    assert!(!flag.delete(&store, true));
    assert!(!delete_tree(&store, &flag, false));
    assert_eq!(store.mutation_count(), 0);
}

#[test]
fn test_absent_node_is_deleted() {
    let store = sample_tree();
    let missing = Key::container(addr(r"HKCU\Never\Was")).unwrap();
    assert!(delete_tree(&store, &missing, false));

    let missing_entry = Key::entry(addr(r"HKCU\Keep\NoValue")).unwrap();
    assert!(delete_tree(&store, &missing_entry, false));

    assert!(delete_tree(&store, &old(), false));
    assert!(delete_tree(&store, &old(), false));
}

#[test]
fn test_reappearing_child_is_retried() {
    let store = sample_tree();
    // Comes back twice: once during the leaf pass, once while the parent removes its subkeys.
    store.respawn_on_delete(&addr(r"HKCU\Old\Empty"), 2).unwrap();

    let report = TreeDeleter::new(&store).run(&old());
    assert!(report.success(), "left behind: {:?}", report.failed);
    assert_eq!(report.passes, 2);
    assert!(!store.contains_key(&addr(r"HKCU\Old")));
}

#[test]
fn test_child_reappearing_once_terminates() {
    let store = sample_tree();
    store.respawn_on_delete(&addr(r"HKCU\Old\Cache\Deep"), 1).unwrap();

    let report = TreeDeleter::new(&store).run(&old());
    assert!(report.success());
    assert!(report.passes <= 2);
}

#[test]
fn test_permanent_denial_gives_up() {
    let store = sample_tree();
    store.deny_write(&addr(r"HKCU\Old\Cache\Deep\Deeper")).unwrap();

    let report = TreeDeleter::new(&store).run(&old());
    assert!(!report.success());
    // One pass that deletes what it can, then one that makes no progress.
    assert_eq!(report.passes, 2);
    assert_eq!(
        report.failed,
        vec![
            addr(r"HKCU\Old\Cache\Deep\Deeper"),
            addr(r"HKCU\Old\Cache\Deep"),
            addr(r"HKCU\Old\Cache"),
            addr(r"HKCU\Old"),
        ]
    );
    // Everything that could go did go.
    assert!(!store.contains_key(&addr(r"HKCU\Old\Empty")));
    assert!(store.contains_key(&addr(r"HKCU\Old\Cache\Deep\Deeper")));
    assert_eq!(store.open_handles(), 0);
}

#[test]
fn test_idle_passes_are_configurable() {
    let store = sample_tree();
    store.deny_write(&addr(r"HKCU\Old\Empty")).unwrap();

    let options = DeleteOptions::new().max_idle_passes(3);
    let report = TreeDeleter::with_options(&store, options).run(&old());
    assert!(!report.success());
    assert_eq!(report.passes, 4);
}

#[test]
fn test_endless_recreation_is_bounded() {
    let store = sample_tree();
    store.respawn_on_delete(&addr(r"HKCU\Old\Empty"), usize::MAX).unwrap();

    let options = DeleteOptions::new().max_passes(5);
    let report = TreeDeleter::with_options(&store, options).run(&old());
    assert!(!report.success());
    assert_eq!(report.passes, 5);
    assert!(report.failed.contains(&addr(r"HKCU\Old")));

    // Every deletion of the re-created key is recorded.
    let empty = addr(r"HKCU\Old\Empty");
    assert!(report.deleted.iter().filter(|a| **a == empty).count() > 1);
}

#[test]
fn test_root_node_is_refused() {
    let store = sample_tree();
    let root = Key::container(addr("HKCU")).unwrap();
    assert!(!delete_tree(&store, &root, true));
    assert_eq!(store.mutation_count(), 0);
}

#[test]
fn test_empty_segment_cannot_reach_the_root() {
    let store = sample_tree();
    let aliases = [
        addr("HKCU").child(""),
        Address::new(["HKCU", ""]).unwrap(),
        Address::new(["HKCU", r"Old\Cache"]).unwrap(),
    ];
    for alias in aliases {
        assert!(Key::container(alias).is_err());
    }

    // Resolving through the facade falls back to the (absent) default value.
    let registry = Registry::new(sample_tree());
    let err = registry.key(&Address::new(["HKCU", ""]).unwrap()).unwrap_err();
    assert!(err.is_not_found());

    assert!(store.contains_key(&addr("HKCU")));
    assert!(store.contains_key(&addr(r"HKCU\Keep")));
    assert!(store.contains_key(&addr(r"HKCU\Old\Cache")));
    assert_eq!(store.mutation_count(), 0);

    // The root itself survives a real deletion started there.
    let root = Key::container(addr("HKCU")).unwrap();
    assert!(!delete_tree(&store, &root, false));
    assert!(store.contains_key(&addr("HKCU")));
    assert!(!store.contains_key(&addr(r"HKCU\Keep")));
}
