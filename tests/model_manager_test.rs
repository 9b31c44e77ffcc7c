use std::{
    cell::{Cell, RefCell},
    rc::Rc,
};

use figurine::{
    config::AssetPaths,
    keys::{AbilityKey, AssetKey, Category, ClassKey},
    manager::{LoadProgress, ModelManager},
};
use futures::executor::block_on;

mod common;
use common::test_utils::FakeSource;

const PLACEHOLDER: &str = "models/ability_placeholder.glb";

fn manager(source: FakeSource) -> ModelManager<FakeSource> {
    ModelManager::new(source, AssetPaths::default(), 2.0)
}

#[test]
fn should_have_nothing_before_loading() {
    let manager = manager(FakeSource::with_all_models());

    assert!(manager.get_class(ClassKey::Mage).is_none());
    assert!(manager.get_ability(AbilityKey::Ability3).is_none());
    assert!(manager.available_classes().is_empty());
    assert!(!manager.is_loaded());
    assert_eq!(
        manager.progress(),
        LoadProgress {
            loaded: 0,
            total: 9
        }
    );
}

#[test]
fn should_load_and_normalize_everything() {
    let mut manager = manager(FakeSource::with_all_models());
    block_on(manager.load_all()).unwrap();

    assert!(manager.is_loaded());
    assert_eq!(manager.available_classes(), ClassKey::ALL.to_vec());
    assert_eq!(manager.available_abilities(), AbilityKey::ALL.to_vec());
    for key in AssetKey::all() {
        let model = match key {
            AssetKey::Class(class) => manager.get_class(class),
            AssetKey::Ability(ability) => manager.get_ability(ability),
        }
        .unwrap();
        let bounds = model.bounding_box().unwrap();
        assert!((bounds.max_dimension() - 2.0).abs() < 1e-4, "{} is not 2 units", key);
        assert!(bounds.center().x.abs() < 1e-4);
        assert!(bounds.center().y.abs() < 1e-4);
        assert!(bounds.center().z.abs() < 1e-4);
    }
}

#[test]
fn should_hand_out_independent_copies() {
    let mut manager = manager(FakeSource::with_all_models());
    block_on(manager.load_all()).unwrap();

    let mut first = manager.get_class(ClassKey::Warrior).unwrap();
    first.transform.position.x += 10.0;
    first.dispose();

    let second = manager.get_class(ClassKey::Warrior).unwrap();
    let bounds = second.bounding_box().unwrap();
    assert!(bounds.center().x.abs() < 1e-4);
    let mesh = second.mesh.as_ref().unwrap();
    assert!(!mesh.primitives[0].geometry.is_empty());
    assert_eq!(mesh.primitives[0].material.texture_count(), 1);
}

#[test]
fn should_share_the_placeholder_between_abilities() {
    let mut manager = manager(FakeSource::with_all_models());
    block_on(manager.load_all()).unwrap();

    let a = manager.get_ability(AbilityKey::Ability1).unwrap();
    let b = manager.get_ability(AbilityKey::Ability5).unwrap();
    assert_eq!(a.name, b.name);
    assert_eq!(a.bounding_box(), b.bounding_box());
}

#[test]
fn should_report_items_in_order_and_complete_once() {
    let mut manager = manager(FakeSource::with_all_models());
    let items = Rc::new(RefCell::new(Vec::new()));
    let completions = Rc::new(Cell::new(0));
    {
        let items = items.clone();
        manager.on_item_loaded(move |progress| items.borrow_mut().push(progress));
        let completions = completions.clone();
        manager.on_complete(move || completions.set(completions.get() + 1));
    }

    block_on(manager.load_all()).unwrap();
    block_on(manager.load_all()).unwrap();

    let loaded: Vec<usize> = items.borrow().iter().map(|p| p.loaded).collect();
    assert_eq!(loaded, (1..=9).collect::<Vec<_>>());
    assert!(items.borrow().iter().all(|p| p.total == 9));
    assert_eq!(completions.get(), 1);
}

#[test]
fn should_report_transfer_progress_per_item() {
    let mut manager = manager(FakeSource::with_all_models());
    let ticks: Rc<RefCell<Vec<(AssetKey, Category, u32)>>> = Rc::new(RefCell::new(Vec::new()));
    {
        let ticks = ticks.clone();
        manager.on_progress(move |key, category, percent| {
            ticks.borrow_mut().push((key, category, percent))
        });
    }

    block_on(manager.load_all()).unwrap();

    let ticks = ticks.borrow();
    for key in AssetKey::all() {
        let percents: Vec<u32> = ticks
            .iter()
            .filter(|(k, _, _)| *k == key)
            .map(|(_, _, p)| *p)
            .collect();
        assert!(percents.len() > 1, "{} reported {:?}", key, percents);
        assert!(percents.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(percents.last(), Some(&100));
    }
    assert!(ticks.iter().all(|(key, category, _)| key.category() == *category));
}

#[test]
fn should_skip_percent_without_content_length() {
    let mut manager = manager(FakeSource::with_all_models().with_unknown_length());
    let ticks = Rc::new(Cell::new(0));
    {
        let ticks = ticks.clone();
        manager.on_progress(move |_, _, _| ticks.set(ticks.get() + 1));
    }

    block_on(manager.load_all()).unwrap();

    assert_eq!(ticks.get(), 0);
    assert!(manager.is_loaded());
}

#[test]
fn should_fail_fast_and_keep_finished_models() {
    let source = FakeSource::with_all_models().without_file("models/paladin.glb");
    let mut manager = manager(source);
    let errors = Rc::new(RefCell::new(Vec::new()));
    let completions = Rc::new(Cell::new(0));
    {
        let errors = errors.clone();
        manager.on_error(move |e| errors.borrow_mut().push(e.key));
        let completions = completions.clone();
        manager.on_complete(move || completions.set(completions.get() + 1));
    }

    let error = block_on(manager.load_all()).unwrap_err();

    assert_eq!(error.key, AssetKey::Class(ClassKey::Paladin));
    assert_eq!(error.path, "models/paladin.glb");
    assert!(error.to_string().contains("404"));
    assert_eq!(*errors.borrow(), vec![AssetKey::Class(ClassKey::Paladin)]);
    assert_eq!(completions.get(), 0);
    assert!(!manager.is_loaded());
    assert!(manager.get_class(ClassKey::Paladin).is_none());
    // Classes load first, so everything queued ahead of the paladin is kept.
    for class in [ClassKey::Warrior, ClassKey::Archer, ClassKey::Mage] {
        assert!(manager.get_class(class).is_some(), "{} was dropped", class);
    }
    let cached = AssetKey::all().filter(|k| manager.contains(*k)).count();
    assert!(cached >= 3);
    assert_eq!(cached, manager.progress().loaded);
}

#[test]
fn should_only_retry_what_is_missing() {
    let source = FakeSource::with_all_models().failing_once("models/archer.glb");
    let mut manager = manager(source);
    let completions = Rc::new(Cell::new(0));
    {
        let completions = completions.clone();
        manager.on_complete(move || completions.set(completions.get() + 1));
    }

    assert!(block_on(manager.load_all()).is_err());
    let before = manager.progress().loaded;
    assert!(before < 9);

    block_on(manager.load_all()).unwrap();

    assert!(manager.is_loaded());
    assert!(manager.get_class(ClassKey::Archer).is_some());
    assert_eq!(completions.get(), 1);
}

#[test]
fn should_fetch_the_placeholder_for_every_ability() {
    let source = FakeSource::with_all_models();
    let fetched = source.fetched.clone();
    let mut manager = manager(source);
    block_on(manager.load_all()).unwrap();

    let placeholder = fetched.borrow().iter().filter(|p| *p == PLACEHOLDER).count();
    assert_eq!(placeholder, 5);
    assert_eq!(fetched.borrow().len(), 9);

    block_on(manager.load_all()).unwrap();
    assert_eq!(fetched.borrow().len(), 9);
}

#[test]
fn should_dispose_everything_and_load_again() {
    let mut manager = manager(FakeSource::with_all_models());
    let completions = Rc::new(Cell::new(0));
    {
        let completions = completions.clone();
        manager.on_complete(move || completions.set(completions.get() + 1));
    }
    block_on(manager.load_all()).unwrap();

    let report = manager.dispose();

    assert_eq!(report.geometries, 9);
    assert_eq!(report.textures, 9);
    assert_eq!(report.materials, 9);
    assert!(manager.get_class(ClassKey::Mage).is_none());
    assert!(manager.available_abilities().is_empty());
    assert_eq!(manager.progress().loaded, 0);
    assert_eq!(manager.dispose(), Default::default());

    block_on(manager.load_all()).unwrap();
    assert!(manager.is_loaded());
    assert_eq!(completions.get(), 2);
}
