//! End-to-end scenarios over an in-memory store and a recording command runner.

use reg_sweep::{
    Address, CommandOutput, CommandRunner, DeleteOptions, Firewall, Key, MemoryStore, Registry,
    RegistryError, Result, ValueData, WalkOptions,
};
use std::cell::RefCell;
use std::fs;

fn addr(text: &str) -> Address {
    Address::parse(text).unwrap()
}

/// Compatibility layers for a handful of programs, plus an unrelated vendor key.
fn compat_registry() -> Registry<MemoryStore> {
    let store = MemoryStore::new();
    let layers = addr(r"HKCU\Software\Microsoft\Windows NT\CurrentVersion\AppCompatFlags\Layers");
    store.set_value(&layers, r"C:\Games\old.exe", ValueData::String("~ WIN98".into())).unwrap();
    store.set_value(&layers, r"C:\Tools\admin.exe", ValueData::String("~ RUNASADMIN".into())).unwrap();
    store.set_value(&layers, r"\\nas\apps\remote.exe", ValueData::String("~ RUNASADMIN".into())).unwrap();
    store.set_value(&addr(r"HKCU\Software\Vendor\App"), "InstallDir", ValueData::ExpandString("%ProgramFiles%\\App".into())).unwrap();
    store.create_key(&addr(r"HKCU\Software\Vendor\App\Plugins\One")).unwrap();
    Registry::new(store)
}

#[test]
fn test_find_path_named_entries() {
    let registry = compat_registry();
    let software = registry.key(&addr(r"HKCU\Software")).unwrap();

    let admin: Vec<Key> = registry.find(&software, |key| {
        key.as_entry()
            .and_then(|entry| entry.value())
            .and_then(ValueData::as_str)
            .is_some_and(|flags| flags.contains("RUNASADMIN"))
    });
    let names: Vec<String> = admin.iter().map(Key::name).collect();
    assert_eq!(names, vec![r"C:\Tools\admin.exe", r"\\nas\apps\remote.exe"]);

    // Each path-named entry is exactly one segment below the Layers key.
    for key in &admin {
        let entry = key.as_entry().unwrap();
        assert_eq!(entry.address().parent().unwrap().raw_name(), "Layers");
    }
}

#[test]
fn test_resolve_and_delete_entry() {
    let registry = compat_registry();
    let address = addr(r"HKCU\Software\Microsoft\Windows NT\CurrentVersion\AppCompatFlags\Layers")
        .compose(r"C:\Games\old.exe")
        .unwrap();

    let key = registry.key(&address).unwrap();
    assert!(key.is_entry());
    assert!(registry.exists(&key).unwrap());
    assert_eq!(registry.metadata(&key).unwrap().value_count, 0);

    assert!(registry.delete(&key, true));
    assert!(registry.exists(&key).unwrap());
    assert!(registry.delete(&key, false));
    assert!(!registry.exists(&key).unwrap());
    assert!(registry.key(&address).unwrap_err().is_not_found());
}

#[test]
fn test_delete_vendor_tree() {
    let registry = compat_registry();
    let vendor = registry.key(&addr(r"HKCU\Software\Vendor")).unwrap();

    let preview = registry.delete_tree(&vendor, DeleteOptions::new().preview(true));
    assert!(preview.success());
    assert_eq!(registry.store().mutation_count(), 0);

    let report = registry.delete_tree(&vendor, DeleteOptions::default());
    assert!(report.success());
    assert_eq!(report.deleted.len(), 5);
    assert!(!registry.exists(&vendor).unwrap());

    let software = registry.key(&addr(r"HKCU\Software")).unwrap();
    let remaining: Vec<String> = registry
        .walk_with(&software, WalkOptions::new().max_depth(1))
        .nodes()
        .map(|key| key.name())
        .collect();
    assert_eq!(remaining, vec!["Microsoft"]);

    let store = registry.into_store();
    assert_eq!(store.open_handles(), 0);
}

#[test]
fn test_metadata_follows_changes() {
    let registry = compat_registry();
    let app = registry.key(&addr(r"HKCU\Software\Vendor\App")).unwrap();

    let before = registry.metadata(&app).unwrap();
    assert_eq!(before.subkey_count, 1);
    assert_eq!(before.value_count, 1);

    registry.store().set_value(&addr(r"HKCU\Software\Vendor\App"), "Second", ValueData::Dword(2)).unwrap();
    let after = registry.metadata(&app).unwrap();
    assert_eq!(after.value_count, 2);
    assert!(after.last_written > before.last_written);
}

#[test]
fn test_denied_container_still_resolves() {
    let registry = compat_registry();
    let plugins = addr(r"HKCU\Software\Vendor\App\Plugins");
    registry.store().deny_read(&plugins).unwrap();

    let key = registry.key(&plugins).unwrap();
    assert!(key.is_container());
    assert!(registry.children(&key).unwrap_err().is_access_denied());
}

/// Records every command line and answers with canned output.
struct RecordingRunner {
    calls: RefCell<Vec<Vec<String>>>,
    stdout: String,
    fail_on: Option<&'static str>,
}

impl RecordingRunner {
    fn new(stdout: &str) -> Self {
        Self {
            calls: RefCell::new(Vec::new()),
            stdout: stdout.to_string(),
            fail_on: None,
        }
    }
}

impl CommandRunner for RecordingRunner {
    fn run(&self, argv: &[String]) -> Result<CommandOutput> {
        self.calls.borrow_mut().push(argv.to_vec());
        let failed = self
            .fail_on
            .is_some_and(|needle| argv.iter().any(|arg| arg.contains(needle)));
        Ok(CommandOutput {
            status: if failed { 1 } else { 0 },
            stdout: self.stdout.clone(),
            stderr: if failed { "denied".into() } else { String::new() },
        })
    }
}

#[test]
fn test_firewall_lists_rules() {
    let runner = RecordingRunner::new("Rule Name: One\n----\nEnabled: Yes\nAction: Block\n");
    let firewall = Firewall::new(&runner);

    let rules = firewall.list_rules_with(&["dir=out"]).unwrap();
    assert_eq!(rules.len(), 2);
    assert_eq!(rules[0].name(), Some("One"));
    assert_eq!(rules[1].get("action"), Some("Block"));

    let calls = runner.calls.borrow();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].last().map(String::as_str), Some("verbose"));
    assert!(calls[0].contains(&"dir=out".to_string()));
}

#[test]
fn test_firewall_blocks_directory() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("b.exe"), b"MZ").unwrap();
    fs::write(dir.path().join("a.EXE"), b"MZ").unwrap();
    fs::write(dir.path().join("readme.txt"), b"text").unwrap();
    fs::create_dir(dir.path().join("nested.exe")).unwrap();

    let runner = RecordingRunner::new("Ok.\n");
    let firewall = Firewall::new(&runner);
    let blocked = firewall.block_directory(dir.path(), true, false).unwrap();

    let names: Vec<String> = blocked
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["a.EXE", "b.exe"]);

    let calls = runner.calls.borrow();
    assert_eq!(calls.len(), 2);
    assert!(calls.iter().all(|argv| argv.contains(&"dir=in".to_string())));
    assert!(calls[0].iter().any(|arg| arg.starts_with("name=APW-") && arg.ends_with("-BKI-a")));
    assert!(calls[1].iter().any(|arg| arg.starts_with("program=") && arg.ends_with("b.exe")));
}

#[test]
fn test_firewall_stops_on_failure() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("one.exe"), b"MZ").unwrap();
    fs::write(dir.path().join("two.exe"), b"MZ").unwrap();

    let mut runner = RecordingRunner::new("");
    runner.fail_on = Some("BKO-one");
    let firewall = Firewall::new(&runner);

    let err = firewall.block_directory(dir.path(), true, true).unwrap_err();
    assert!(matches!(err, RegistryError::CommandFailed { status: 1, .. }));
    assert_eq!(runner.calls.borrow().len(), 2);
}

#[test]
fn test_firewall_missing_directory() {
    let dir = tempfile::tempdir().unwrap();
    let runner = RecordingRunner::new("");
    let firewall = Firewall::new(&runner);

    let err = firewall.block_directory(&dir.path().join("absent"), true, true).unwrap_err();
    assert!(err.is_not_found());
    assert!(runner.calls.borrow().is_empty());
}
