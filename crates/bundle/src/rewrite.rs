use orbfield_common::{SUSPEND_KEYWORD, scan_imports};

/// Turn every import call into a suspension point: `require(` becomes
/// `yield require(`. Calls already suspended are left as they are.
pub fn rewrite_imports(source: &str) -> String {
    let sites: Vec<usize> = scan_imports(source)
        .into_iter()
        .filter(|site| !site.suspended)
        .map(|site| site.offset)
        .collect();

    let mut out = String::with_capacity(source.len() + sites.len() * (SUSPEND_KEYWORD.len() + 1));
    let mut last = 0;
    for offset in sites {
        out.push_str(&source[last..offset]);
        out.push_str(SUSPEND_KEYWORD);
        out.push(' ');
        last = offset;
    }
    out.push_str(&source[last..]);
    out
}
