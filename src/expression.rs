//! Arithmetic for companion spawn coordinates.
//!
//! Descriptor files carry tiny formulas such as `imageX+imageW/2` or
//! `screenW*random/100`. The file is editable by anyone, so the text is
//! checked against an allow-list before a small four-operator evaluator ever
//! looks at it. Any rejection evaluates to `0.0`; nothing here panics.
use log::warn;

/// Adjacent-operator sequences that are never valid arithmetic here.
const DENYLIST: [&str; 16] = [
    "++", "--", "**", "//", "+-", "-+", "*+", "/+", "+*", "+/", "-*", "-/", "*/", "/*", "()",
    "( )",
];

const OPERATORS: [char; 4] = ['+', '-', '*', '/'];

/// The fixed variable set an expression may reference.
///
/// `random` and `random_second` are rolled once per spawn event by the caller
/// so the X and Y expressions of one spawn see the same values.
#[derive(Debug, Default, Copy, Clone, PartialEq)]
pub struct ExpressionVariables {
    pub screen_width: f64,
    pub screen_height: f64,
    pub area_width: f64,
    pub area_height: f64,
    pub image_x: f64,
    pub image_y: f64,
    pub image_width: f64,
    pub image_height: f64,
    pub random: f64,
    pub random_second: f64,
}

impl ExpressionVariables {
    /// Name/value pairs. No name is a substring of another, so the order
    /// of substitution does not matter.
    fn bindings(&self) -> [(&'static str, f64); 10] {
        [
            ("screenW", self.screen_width),
            ("screenH", self.screen_height),
            ("random", self.random),
            ("imageX", self.image_x),
            ("imageY", self.image_y),
            ("imageW", self.image_width),
            ("imageH", self.image_height),
            ("areaW", self.area_width),
            ("areaH", self.area_height),
            ("randS", self.random_second),
        ]
    }
}

/// Evaluates `expression` with `variables` substituted.
/// - returns `0.0` for anything unsafe, malformed, or non-finite
pub fn evaluate(expression: &str, variables: &ExpressionVariables) -> f64 {
    let text = substitute(expression, variables);
    if let Err(reason) = validate(&text) {
        warn!("rejected expression '{}' ({})", expression, reason);
        return 0.0;
    }
    match Parser::new(&text).and_then(|parser| parser.parse()) {
        Some(value) if value.is_finite() => value,
        Some(_) => {
            warn!("expression '{}' is not finite, using 0", expression);
            0.0
        }
        None => {
            warn!("could not evaluate expression '{}'", expression);
            0.0
        }
    }
}

fn substitute(expression: &str, variables: &ExpressionVariables) -> String {
    let mut text = expression.to_string();
    for (name, value) in variables.bindings() {
        if !text.contains(name) {
            continue;
        }
        let value = if value.is_finite() { value } else { 0.0 };
        // negative literals are parenthesised so `5-imageX` stays valid
        let literal = if value < 0.0 {
            format!("({})", value)
        } else {
            value.to_string()
        };
        text = text.replace(name, &literal);
    }
    text
}

fn validate(text: &str) -> Result<(), &'static str> {
    let allowed = |c: char| c.is_ascii_digit() || c == '.' || c == '(' || c == ')' || OPERATORS.contains(&c) || c.is_whitespace();
    if !text.chars().all(allowed) {
        return Err("character outside the allow-list");
    }

    let mut depth: i32 = 0;
    for c in text.chars() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth < 0 {
                    return Err("unbalanced parentheses");
                }
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err("unbalanced parentheses");
    }

    if DENYLIST.iter().any(|pattern| text.contains(pattern)) {
        return Err("adjacent operators");
    }

    let trimmed = text.trim();
    match trimmed.chars().last() {
        None => return Err("empty expression"),
        Some(c) if OPERATORS.contains(&c) || c == '(' => return Err("dangling operator"),
        _ => {}
    }
    if trimmed.starts_with(['+', '*', '/']) {
        return Err("leading operator");
    }
    Ok(())
}

#[derive(Debug, Copy, Clone, PartialEq)]
enum Token {
    Number(f64),
    Plus,
    Minus,
    Star,
    Slash,
    Open,
    Close,
}

/// Recursive descent over the validated text :
/// - expr    = term (('+' | '-') term)*
/// - term    = unary (('*' | '/') unary)*
/// - unary   = '-' unary | primary
/// - primary = number | '(' expr ')'
struct Parser {
    tokens: Vec<Token>,
    cursor: usize,
}

impl Parser {
    fn new(text: &str) -> Option<Self> {
        let mut tokens = Vec::new();
        let mut chars = text.chars().peekable();
        while let Some(&c) = chars.peek() {
            let token = match c {
                ' ' | '\t' | '\n' | '\r' => {
                    chars.next();
                    continue;
                }
                '+' => Token::Plus,
                '-' => Token::Minus,
                '*' => Token::Star,
                '/' => Token::Slash,
                '(' => Token::Open,
                ')' => Token::Close,
                _ if c.is_ascii_digit() || c == '.' => {
                    let mut literal = String::new();
                    while let Some(&d) = chars.peek() {
                        if d.is_ascii_digit() || d == '.' {
                            literal.push(d);
                            chars.next();
                        } else {
                            break;
                        }
                    }
                    tokens.push(Token::Number(literal.parse().ok()?));
                    continue;
                }
                _ => return None,
            };
            tokens.push(token);
            chars.next();
        }
        Some(Parser { tokens, cursor: 0 })
    }

    fn parse(mut self) -> Option<f64> {
        let value = self.expr()?;
        // trailing tokens such as "1 2" are malformed
        if self.cursor != self.tokens.len() {
            return None;
        }
        Some(value)
    }

    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.cursor).copied()
    }

    fn bump(&mut self) -> Option<Token> {
        let token = self.peek()?;
        self.cursor += 1;
        Some(token)
    }

    fn expr(&mut self) -> Option<f64> {
        let mut value = self.term()?;
        while let Some(op @ (Token::Plus | Token::Minus)) = self.peek() {
            self.cursor += 1;
            let rhs = self.term()?;
            value = if op == Token::Plus { value + rhs } else { value - rhs };
        }
        Some(value)
    }

    fn term(&mut self) -> Option<f64> {
        let mut value = self.unary()?;
        while let Some(op @ (Token::Star | Token::Slash)) = self.peek() {
            self.cursor += 1;
            let rhs = self.unary()?;
            value = if op == Token::Star { value * rhs } else { value / rhs };
        }
        Some(value)
    }

    fn unary(&mut self) -> Option<f64> {
        if self.peek() == Some(Token::Minus) {
            self.cursor += 1;
            return Some(-self.unary()?);
        }
        self.primary()
    }

    fn primary(&mut self) -> Option<f64> {
        match self.bump()? {
            Token::Number(value) => Some(value),
            Token::Open => {
                let value = self.expr()?;
                match self.bump()? {
                    Token::Close => Some(value),
                    _ => None,
                }
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn eval(text: &str) -> f64 {
        evaluate(text, &ExpressionVariables::default())
    }

    #[test]
    fn follows_conventional_precedence() {
        assert_relative_eq!(eval("1+2*3"), 7.0);
        assert_relative_eq!(eval("(1+2)*3"), 9.0);
        assert_relative_eq!(eval("10/4-0.5"), 2.0);
        assert_relative_eq!(eval(" 8 - 2 - 1 "), 5.0);
        assert_relative_eq!(eval("-3*2"), -6.0);
        assert_relative_eq!(eval("2*-3"), -6.0);
        assert_relative_eq!(eval("((4))"), 4.0);
    }

    #[test]
    fn substitutes_every_variable() {
        let vars = ExpressionVariables {
            screen_width: 1920.0,
            screen_height: 1080.0,
            area_width: 1900.0,
            area_height: 1040.0,
            image_x: 300.0,
            image_y: 200.0,
            image_width: 40.0,
            image_height: 40.0,
            random: 50.0,
            random_second: 10.0,
        };
        assert_relative_eq!(evaluate("imageX+imageW/2", &vars), 320.0);
        assert_relative_eq!(evaluate("screenW*random/100", &vars), 960.0);
        assert_relative_eq!(evaluate("areaH-imageH-randS", &vars), 990.0);
        assert_relative_eq!(evaluate("screenH-areaH+areaW-screenW", &vars), 20.0);
        assert_relative_eq!(evaluate("imageY", &vars), 200.0);
    }

    #[test]
    fn negative_variables_stay_valid_after_subtraction() {
        let vars = ExpressionVariables {
            image_x: -50.0,
            ..Default::default()
        };
        assert_relative_eq!(evaluate("5-imageX", &vars), 55.0);
    }

    #[test]
    fn rejects_anything_outside_the_allow_list() {
        assert_eq!(eval("1+a"), 0.0);
        assert_eq!(eval("unknownVar*2"), 0.0);
        assert_eq!(eval("2^3"), 0.0);
        assert_eq!(eval("1e3"), 0.0);
    }

    #[test]
    fn rejects_unbalanced_and_denylisted_forms() {
        for text in [
            "(1+2", "1+2)", ")1(", "1++2", "1--2", "2**3", "4//2", "1+-2", "1-+2", "2*+3", "2/+3",
            "1+*2", "1+/2", "1-*2", "1-/2", "2*/3", "2/*3", "()", "( )", "1+", "2*(", "+1", "*2",
            "/2", "", "   ",
        ] {
            assert_eq!(eval(text), 0.0, "{text:?} should be rejected");
        }
    }

    #[test]
    fn non_finite_results_collapse_to_zero() {
        assert_eq!(eval("1/0"), 0.0);
        assert_eq!(eval("0/0"), 0.0);
    }

    #[test]
    fn malformed_numbers_collapse_to_zero() {
        assert_eq!(eval("1.2.3"), 0.0);
        assert_eq!(eval("1 2"), 0.0);
        assert_eq!(eval("."), 0.0);
    }
}
