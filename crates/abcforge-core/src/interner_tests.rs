//! Unit tests for the string pool.

use super::interner::Interner;

#[test]
fn intern_is_first_writer_wins() {
    let mut pool = Interner::new();

    let a = pool.intern("lda.str");
    let b = pool.intern("lda.str");

    assert_eq!(a, b);
    assert_eq!(pool.len(), 1);
}

#[test]
fn distinct_strings_get_distinct_symbols() {
    let mut pool = Interner::new();

    let a = pool.intern("./mod_a");
    let b = pool.intern("./mod_b");

    assert_ne!(a, b);
    assert_eq!(pool.resolve(a), "./mod_a");
    assert_eq!(pool.resolve(b), "./mod_b");
}

#[test]
fn get_does_not_insert() {
    let mut pool = Interner::new();

    assert!(pool.get("absent").is_none());
    pool.intern("present");

    assert!(pool.get("present").is_some());
    assert_eq!(pool.len(), 1);
}

#[test]
fn try_resolve_rejects_foreign_symbol() {
    let mut a = Interner::new();
    let mut b = Interner::new();
    b.intern("only-in-b");
    let sym = b.intern("second");

    a.intern("only-in-a");

    assert!(a.try_resolve(sym).is_none());
}

#[test]
fn iter_preserves_insertion_order() {
    let mut pool = Interner::new();
    pool.intern("first");
    pool.intern("second");

    let names: Vec<&str> = pool.iter().map(|(_, s)| s).collect();

    assert_eq!(names, ["first", "second"]);
}
