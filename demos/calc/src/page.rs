/// Calculator home page, optionally showing the result of a previous sum.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct HomePage {
  /// First operand.
  pub a: f64,
  /// Second operand.
  pub b: f64,
  /// Sum of the operands. The result section is only shown when non-zero.
  pub sum: f64,
}

impl HomePage {
  /// Render the page as HTML.
  pub fn render(&self) -> String {
    let result = if self.sum != 0.0 {
      format!(
        r#"
  <h2>Result</h2>
  <pre>{a} + {b} = {sum}</pre>
"#,
        a = self.a,
        b = self.b,
        sum = self.sum,
      )
    } else {
      String::new()
    };

    format!(
      r#"
<html>
<body>
<h1>calc</h1>
{result}
  <form method="POST" action="/sum">
    <input type="text" name="a" size="2" value="{a}"> + <input type="text" name="b" size="2" value="{b}">
    <input type="submit">
  </form>

</body>
</html>
"#,
      a = self.a,
      b = self.b,
    )
  }
}
