/// Maps byte offsets in a source file to 1-based line and column numbers.
#[derive(Debug)]
pub(crate) struct LineResolver {
    lines: Vec<usize>,
}

impl LineResolver {
    pub fn new(source_code: &str) -> Self {
        let lines = source_code
            .match_indices('\n')
            .map(|(index, _)| index + 1)
            .collect();
        LineResolver { lines }
    }

    pub fn resolve(&self, offset: usize) -> (usize, usize) {
        match self.lines.binary_search(&offset) {
            Ok(index) => (index + 2, 1),
            Err(0) => (1, offset + 1),
            Err(index) => (index + 1, offset - self.lines[index - 1] + 1),
        }
    }
}

#[test]
fn resolve_line_number() {
    let resolver = LineResolver::new("hello\nworld\nfoo");

    assert_eq!(resolver.resolve(0), (1, 1));
    assert_eq!(resolver.resolve(4), (1, 5));
    assert_eq!(resolver.resolve(5), (1, 6));
    assert_eq!(resolver.resolve(6), (2, 1));
    assert_eq!(resolver.resolve(7), (2, 2));
    assert_eq!(resolver.resolve(11), (2, 6));
    assert_eq!(resolver.resolve(12), (3, 1));
    assert_eq!(resolver.resolve(14), (3, 3));
    assert_eq!(resolver.resolve(15), (3, 4));
}
