// promptmap/src/helpers.rs
//! Path → module id mapping and token-string cleanup shared by the analyzer.

/* ============================= Module identification ============================= */

/// Module id for a Rust source file, relative to the scanned root.
/// Anything up to and including the last `src/` component is dropped, so
/// workspace-relative paths (`crates/core/src/a/b.rs`) map the same way as
/// crate-relative ones.
///
/// - src/lib.rs        -> crate
/// - src/main.rs       -> bin
/// - src/bin/foo.rs    -> bin::foo
/// - src/foo/bar.rs    -> foo::bar
/// - src/foo/mod.rs    -> foo
/// - tests/it.rs       -> tests::it
pub fn rust_module_id(path: &str) -> String {
    let p = path.replace('\\', "/");
    let p = p.trim_matches('/');

    let in_src = if let Some(rest) = p.strip_prefix("src/") {
        Some(rest)
    } else {
        p.rfind("/src/").map(|i| &p[i + "/src/".len()..])
    };

    let Some(rest) = in_src else {
        return generic_module_id(p);
    };

    match rest {
        "lib.rs" => return "crate".into(),
        "main.rs" => return "bin".into(),
        _ => {}
    }
    if let Some(bin) = rest.strip_prefix("bin/") {
        let bin = bin.strip_suffix("/main.rs").unwrap_or(bin);
        return format!("bin::{}", generic_module_id(bin));
    }
    if let Some(modpath) = rest.strip_suffix("/mod.rs") {
        return modpath.replace('/', "::");
    }
    generic_module_id(rest)
}

/// Strip the extension; use `::` as separator.
pub fn generic_module_id(p: &str) -> String {
    let stem = p.strip_suffix(".rs").unwrap_or(p);
    stem.replace('/', "::")
}

/// `parent::child`, treating `crate` as the implicit root of nested modules.
pub fn join_module(parent: &str, child: &str) -> String {
    if parent.is_empty() || parent == "crate" {
        child.to_string()
    } else {
        format!("{parent}::{child}")
    }
}

/* ================================ Token cleanup ================================ */

/// `quote` renders tokens space-separated (`Vec < String >`); collapse that
/// back into how the code was most likely written.
pub fn normalize_token_string(s: &str) -> String {
    let mut out = s.to_string();
    for (a, b) in [
        (" < ", "<"),
        ("< ", "<"),
        (" >", ">"),
        (" ( ", "("),
        ("( ", "("),
        (" )", ")"),
        (" [ ", "["),
        ("[ ", "["),
        (" ]", "]"),
        (" :: ", "::"),
        (":: ", "::"),
        ("& '", "&'"),
        ("& ", "&"),
        (" ,", ","),
        (" ;", ";"),
        (" :", ":"),
        ("# [", "#["),
        ("Fn (", "Fn("),
        ("FnMut (", "FnMut("),
        ("FnOnce (", "FnOnce("),
        ("fn (", "fn("),
    ] {
        out = out.replace(a, b);
    }
    // `->` and `=>` lose their spacing from the `>` rule above
    out.replace("->", " -> ").replace("  ", " ").trim().to_string()
}

/// Token stream of anything `quote` can print, cleaned up.
pub fn norm_tokens<T: quote::ToTokens>(t: &T) -> String {
    normalize_token_string(&t.to_token_stream().to_string())
}

/* ===================================== Tests ===================================== */

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rust_module_paths() {
        assert_eq!(rust_module_id("src/lib.rs"), "crate");
        assert_eq!(rust_module_id("src/main.rs"), "bin");
        assert_eq!(rust_module_id("src/bin/foo.rs"), "bin::foo");
        assert_eq!(rust_module_id("src/bin/tool/main.rs"), "bin::tool");
        assert_eq!(rust_module_id("src/a/b.rs"), "a::b");
        assert_eq!(rust_module_id("src/a/mod.rs"), "a");
    }

    #[test]
    fn workspace_relative_paths() {
        assert_eq!(rust_module_id("crates/core/src/lib.rs"), "crate");
        assert_eq!(rust_module_id("crates/core/src/net/tcp.rs"), "net::tcp");
        assert_eq!(rust_module_id("crates\\core\\src\\net\\mod.rs"), "net");
        assert_eq!(rust_module_id("tests/it.rs"), "tests::it");
        assert_eq!(rust_module_id("build.rs"), "build");
    }

    #[test]
    fn nested_modules_join() {
        assert_eq!(join_module("crate", "inner"), "inner");
        assert_eq!(join_module("a::b", "inner"), "a::b::inner");
        assert_eq!(join_module("", "x"), "x");
    }

    #[test]
    fn token_strings_collapse() {
        assert_eq!(normalize_token_string("Vec < String >"), "Vec<String>");
        assert_eq!(normalize_token_string("HashMap < String , Vec < u8 > >"), "HashMap<String, Vec<u8>>");
        assert_eq!(normalize_token_string("& 'a str"), "&'a str");
        assert_eq!(normalize_token_string("& mut self"), "&mut self");
        assert_eq!(normalize_token_string("std :: io :: Result < () >"), "std::io::Result<()>");
        assert_eq!(normalize_token_string("Box < dyn Fn (u8) -> u8 >"), "Box<dyn Fn(u8) -> u8>");
    }
}
