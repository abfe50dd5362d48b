//! Point queries: definition, hover, completion, find-references

mod common;

use common::{fixture, id, key, offset_of};
use meridian::{DeclKind, FileState, ModelConfig, TypeDescriptor};

const USER_PHP: &str = "namespace App {
  class Base {
    var $id: int;
    function hello(): string { return 'hi'; }
  }
  class User extends Base {
    var $name: string;
    function getName(): string { return $this->name; }
  }
}
";

const MAIN_PHP: &str = "namespace App {
  function main() {
    // User is mentioned here
    $u = new User();
    $u->getName();
    $u->
  }
  function other() {
    $x = main();
    $x->
  }
}
";

fn files() -> Vec<(&'static str, &'static str)> {
    vec![("user.php", USER_PHP), ("main.php", MAIN_PHP)]
}

#[test]
fn test_definition_of_member_call() {
    let mut fx = fixture(ModelConfig::default(), &files());

    let offset = offset_of(MAIN_PHP, "getName", 0) + 2;
    let location = fx.model.definition_at(&key("main.php"), offset).unwrap();

    assert_eq!(location.file, key("user.php"));
    assert_eq!(location.span.start, offset_of(USER_PHP, "function getName", 0));
}

#[test]
fn test_definition_at_end_of_reference_still_hits() {
    let mut fx = fixture(ModelConfig::default(), &files());

    let offset = offset_of(MAIN_PHP, "new User", 0) + "new User".len();
    let location = fx.model.definition_at(&key("main.php"), offset).unwrap();

    assert_eq!(location.span.start, offset_of(USER_PHP, "class User", 0));
}

#[test]
fn test_query_escalates_unanalyzed_files() {
    let mut fx = fixture(ModelConfig::default(), &files());
    assert_eq!(fx.model.file_state(&key("main.php")), Some(FileState::Unscanned));

    let offset = offset_of(MAIN_PHP, "User()", 0);
    assert!(fx.model.definition_at(&key("main.php"), offset).is_some());

    // The unscanned dependency was analyzed in the same batch
    assert_eq!(fx.model.file_state(&key("main.php")), Some(FileState::Analyzed));
    assert_eq!(fx.model.file_state(&key("user.php")), Some(FileState::Analyzed));
    let calls = fx.analyzer.calls();
    assert!(calls.contains(&key("main.php")));
    assert!(calls.contains(&key("user.php")));
}

#[test]
fn test_hover_on_class_reference_shows_symbol_information() {
    let mut fx = fixture(ModelConfig::default(), &files());

    let offset = offset_of(MAIN_PHP, "User()", 0);
    let hover = fx.model.hover_at(&key("main.php"), offset).unwrap();

    assert_eq!(hover.contents, "class App\\User");
    assert_eq!(hover.symbol, Some(id("app\\user")));
}

#[test]
fn test_hover_on_member_shows_signature() {
    let mut fx = fixture(ModelConfig::default(), &files());

    let offset = offset_of(MAIN_PHP, "getName", 0);
    let hover = fx.model.hover_at(&key("main.php"), offset).unwrap();

    assert_eq!(hover.contents, "function getName(): string");
}

#[test]
fn test_hover_on_variable_shows_inferred_type() {
    let mut fx = fixture(ModelConfig::default(), &files());

    let offset = offset_of(MAIN_PHP, "$u", 1) + 1;
    let hover = fx.model.hover_at(&key("main.php"), offset).unwrap();

    assert_eq!(hover.contents, "App\\User");
    assert!(hover.symbol.is_none());
}

#[test]
fn test_hover_just_past_a_reference_is_empty() {
    let mut fx = fixture(ModelConfig::default(), &files());

    let end = offset_of(MAIN_PHP, "getName", 0) + "getName".len();
    assert!(fx.model.hover_at(&key("main.php"), end).is_none());
    // Go-to-definition still accepts a cursor touching the end
    assert!(fx.model.definition_at(&key("main.php"), end).is_some());
}

#[test]
fn test_hover_inside_comment_is_empty() {
    let mut fx = fixture(ModelConfig::default(), &files());

    let offset = offset_of(MAIN_PHP, "mentioned", 0);
    assert!(fx.model.hover_at(&key("main.php"), offset).is_none());
    assert_eq!(fx.model.file_state(&key("main.php")), Some(FileState::Analyzed));
}

#[test]
fn test_queries_out_of_range_or_unknown_are_empty() {
    let mut fx = fixture(ModelConfig::default(), &files());

    assert!(fx.model.hover_at(&key("main.php"), MAIN_PHP.len() + 10).is_none());
    assert!(fx.model.definition_at(&key("main.php"), MAIN_PHP.len() + 10).is_none());
    assert!(fx.model.completion_at(&key("main.php"), MAIN_PHP.len() + 10).is_empty());
    assert!(fx.model.definition_at(&key("missing.php"), 0).is_none());
    assert!(fx.model.get_maps_for_file(&key("missing.php")).is_err());
}

#[test]
fn test_completion_offers_own_and_inherited_members() {
    let mut fx = fixture(ModelConfig::default(), &files());

    let offset = offset_of(MAIN_PHP, "$u->\n", 0) + "$u->".len();
    let items = fx.model.completion_at(&key("main.php"), offset);

    let labels: Vec<&str> = items.iter().map(|i| i.label.as_str()).collect();
    assert_eq!(labels, vec!["name", "getName", "id", "hello"]);

    let hello = items.iter().find(|i| i.label == "hello").unwrap();
    assert_eq!(hello.kind, DeclKind::Method);
    assert_eq!(hello.symbol, id("app\\base::hello"));
    assert_eq!(hello.detail, "function hello(): string");
}

#[test]
fn test_completion_needs_member_access_operator() {
    let mut fx = fixture(ModelConfig::default(), &files());

    // Cursor right after the variable, before `->`
    let offset = offset_of(MAIN_PHP, "$u->\n", 0) + "$u".len();
    assert!(fx.model.completion_at(&key("main.php"), offset).is_empty());
}

#[test]
fn test_completion_on_mixed_type_is_empty() {
    let mut fx = fixture(ModelConfig::default(), &files());

    let offset = offset_of(MAIN_PHP, "$x->", 0) + "$x->".len();
    assert!(fx.model.completion_at(&key("main.php"), offset).is_empty());
}

#[test]
fn test_stubbed_constant_type_is_visible_to_analysis() {
    let text = "function k() { APP_MODE; }\n";
    let mut fx = fixture(ModelConfig::default(), &[("k.php", text)]);
    fx.model.stub_constant("APP_MODE", TypeDescriptor::new("string"));

    let hover = fx
        .model
        .hover_at(&key("k.php"), offset_of(text, "APP_MODE", 0))
        .unwrap();
    assert_eq!(hover.contents, "string");
}

#[test]
fn test_references_to_collects_every_location() {
    let config = ModelConfig::default().with_collect_references(true);
    let mut fx = fixture(config, &files());

    let locations = fx.model.references_to(&id("app\\user::getname"));

    assert_eq!(locations.len(), 1);
    assert_eq!(locations[0].file, key("main.php"));
    assert_eq!(locations[0].span.start, offset_of(MAIN_PHP, "getName", 0));
}

#[test]
fn test_references_to_needs_collection_mode() {
    let mut fx = fixture(ModelConfig::default(), &files());
    fx.model.analyze_all();

    assert!(fx.model.references_to(&id("app\\user")).is_empty());
    // The reference graph still tracks which files depend on the class
    assert_eq!(
        fx.model.reference_graph().files_referencing(&id("app\\user")),
        vec![key("main.php")]
    );
}

#[test]
fn test_maps_are_sorted_and_disjoint() {
    let mut fx = fixture(ModelConfig::default(), &files());

    for file in ["user.php", "main.php"] {
        let (references, types) = fx.model.get_maps_for_file(&key(file)).unwrap();
        assert!(references.is_well_formed());
        assert!(types.is_well_formed());
        for pair in types.entries().windows(2) {
            assert!(pair[0].end <= pair[1].start);
        }
    }
}
