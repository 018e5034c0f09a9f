//! Simple tests for "this SRC creates this shell script" go here.

use insta::assert_snapshot;
use similar_asserts::assert_eq;

use crate::{compile, Compiler};

#[test]
fn test_hello() {
    assert_snapshot!(compile(
        r#"
package main

import "fmt"

func main() {
	fmt.Println("hi")
}
"#
    )
    .unwrap(), @r###"
    #!/bin/bash

    function main() {
      echo "hi"
    }
    main "${@}"
    "###);
}

#[test]
fn test_empty_source() {
    assert_eq!(compile("").unwrap(), "#!/bin/bash\n\n");
}

#[test]
fn test_main_only_appends_entry_call() {
    assert_snapshot!(compile("package main\n\nfunc main() {}\n").unwrap(), @r###"
    #!/bin/bash

    function main() {
    }
    main "${@}"
    "###);
}

#[test]
fn test_fizzbuzz() {
    let script = compile(
        r#"
package main

import "fmt"

const fizz = "Fizz"
const buzz = "Buzz"

func FizzBuzz(n int) {
	for i := 1; i <= n; i++ {
		if i%15 == 0 {
			fmt.Println(fizz + buzz)
		} else if i%3 == 0 {
			fmt.Println(fizz)
		} else if i%5 == 0 {
			fmt.Println(buzz)
		} else {
			fmt.Println(i)
		}
	}
}

func main() {
	FizzBuzz(15)
}
"#,
    )
    .unwrap();
    assert_snapshot!(script, @r###"
    #!/bin/bash

    fizz="Fizz"
    buzz="Buzz"
    function FizzBuzz() {
      local n="$1"; shift
      local i=1
      while [ $(( i <= n )) -ne 0 ]; do :
        if [ $(( i%15 == 0 )) -ne 0 ]; then :
          echo "$fizz""$buzz"
        elif [ $(( i%3 == 0 )) -ne 0 ]; then :
          echo "$fizz"
        elif [ $(( i%5 == 0 )) -ne 0 ]; then :
          echo "$buzz"
        else
          echo "$i"
        fi
      let "i++"; done
    }
    function main() {
      FizzBuzz 15
    }
    main "${@}"
    "###);
    // Every opened block has exactly one terminator.
    assert_eq!(script.matches("fi\n").count(), 1);
    assert_eq!(script.matches("done\n").count(), 1);
    assert_eq!(script.matches('}').count(), script.matches('{').count());
}

#[test]
fn test_status_code_return() {
    assert_snapshot!(compile(
        r#"
package main

import "github.com/binzume/gotosh/shell"

func addStatus(x, y int) shell.StatusCode {
	return shell.StatusCode(x + y)
}

func main() {
	addStatus(4, 5)
}
"#
    )
    .unwrap(), @r###"
    #!/bin/bash

    function addStatus() {
      local x="$1"; shift
      local y="$1"; shift
      return $(( x+y ))
    }
    function main() {
      addStatus 4 5
    }
    main "${@}"
    "###);
}

#[test]
fn test_stdout_and_status_capture() {
    assert_snapshot!(compile(
        r#"
package main

import (
	"fmt"

	"github.com/binzume/gotosh/shell"
)

func f() (string, shell.StatusCode) {
	return "aaa", 123
}

func main() {
	msg, st := f()
	fmt.Println(msg, st)
}
"#
    )
    .unwrap(), @r###"
    #!/bin/bash

    function f() {
      echo "aaa"; return 123
    }
    function main() {
      local msg
      msg="$(f)"
      local st="$?"
      echo "$msg" "$st"
    }
    main "${@}"
    "###);
}

#[test]
fn test_shadow_variable_returns() {
    assert_snapshot!(compile(
        r#"
package main

import (
	"fmt"

	"github.com/binzume/gotosh/shell"
)

func three() (shell.TempVarString, shell.TempVarString, shell.TempVarString) {
	return "abc", "def", "ghi"
}

func main() {
	a, b, c := three()
	fmt.Println(a, b, c)
}
"#
    )
    .unwrap(), @r###"
    #!/bin/bash

    function three() {
      _tmp0="abc"; _tmp1="def"; _tmp2="ghi"; return
    }
    function main() {
      three
      local a="$_tmp0"
      local b="$_tmp1"
      local c="$_tmp2"
      echo "$a" "$b" "$c"
    }
    main "${@}"
    "###);
}

#[test]
fn test_range_over_slice_literal() {
    assert_snapshot!(compile(
        r#"
package main

import "fmt"

func main() {
	for i, v := range []int{2, 4, 6} {
		fmt.Println(i, v)
	}
}
"#
    )
    .unwrap(), @r###"
    #!/bin/bash

    function main() {
      local i=0
      for v in 2 4 6; do :
        echo "$i" "$v"
      let "i++"; done
    }
    main "${@}"
    "###);
}

#[test]
fn test_string_slice() {
    assert_snapshot!(compile(
        r#"
package main

import "fmt"

func main() {
	s := "abcdef"
	fmt.Println(s[1:4])
}
"#
    )
    .unwrap(), @r###"
    #!/bin/bash

    function main() {
      local s="abcdef"
      echo "${s:1:3}"
    }
    main "${@}"
    "###);
}

#[test]
fn test_arrays_append_len_index() {
    assert_snapshot!(compile(
        r#"
package main

import "fmt"

func main() {
	var a = []int{1, 2}
	a = append(a, 3)
	fmt.Println(len(a), a[1])
	for i := 0; i < len(a); i++ {
		fmt.Println(a[i])
	}
}
"#
    )
    .unwrap(), @r###"
    #!/bin/bash

    function main() {
      local a=(1 2)
      a+=(3)
      echo ${#a[@]} "${a[1]}"
      local i=0
      while [ $(( i < ${#a[@]} )) -ne 0 ]; do :
        echo "${a[$i]}"
      let "i++"; done
    }
    main "${@}"
    "###);
}

#[test]
fn test_empty_composite_literal() {
    assert_snapshot!(compile(
        r#"
package main

func main() {
	var a = []int{}
	a = append(a, 7)
}
"#
    )
    .unwrap(), @r###"
    #!/bin/bash

    function main() {
      local a=()
      a+=(7)
    }
    main "${@}"
    "###);
}

#[test]
fn test_short_struct_literal_defaults() {
    assert_snapshot!(compile(
        r#"
package main

import "fmt"

type Person struct {
	Name string
	Age  int
}

func main() {
	p := Person{"ann"}
	q := Person{}
	fmt.Println(p.Name, p.Age, q.Name, q.Age)
}
"#
    )
    .unwrap(), @r###"
    #!/bin/bash

    function main() {
      local p__Name="ann"
      local p__Age=0
      local q__Name=""
      local q__Age=0
      echo "$p__Name" "$p__Age" "$q__Name" "$q__Age"
    }
    main "${@}"
    "###);
}

#[test]
fn test_positional_parameter_builtin() {
    assert_snapshot!(compile(
        r#"
package main

import (
	"fmt"

	"github.com/binzume/gotosh/shell"
)

func main() {
	fmt.Println(shell.Arg(10))
}
"#
    )
    .unwrap(), @r###"
    #!/bin/bash

    function main() {
      echo "$(eval echo \${10})"
    }
    main "${@}"
    "###);
}

#[test]
fn test_string_builtins() {
    assert_snapshot!(compile(
        r#"
package main

import (
	"fmt"
	"strings"
)

func main() {
	s := "abc" + "def"
	fmt.Println(strings.ToUpper(s))
	fmt.Println(strings.ReplaceAll(s, "c", "0"))
	fmt.Println(strings.Contains(s, "cd"))
	fmt.Println(len(s))
}
"#
    )
    .unwrap(), @r###"
    #!/bin/bash

    function main() {
      local s="abc""def"
      echo "$(echo "$s"|tr '[:lower:]' '[:upper:]')"
      echo "${s//"c"/"0"}"
      echo "$(case "$s" in (*"cd"*) echo 1;; (*) echo 0;; esac)"
      echo ${#s}
    }
    main "${@}"
    "###);
}

#[test]
fn test_string_compare() {
    assert_snapshot!(compile(
        r#"
package main

import "fmt"

func main() {
	s := "abc"
	if s == "abc" {
		fmt.Println("eq")
	}
}
"#
    )
    .unwrap(), @r###"
    #!/bin/bash

    function main() {
      local s="abc"
      if [ $([[ "$s" == "abc" ]] && echo 1 || echo 0) -ne 0 ]; then :
        echo "eq"
      fi
    }
    main "${@}"
    "###);
}

#[test]
fn test_struct_method_dispatch() {
    assert_snapshot!(compile(
        r#"
package main

import "fmt"

type Vector2 struct {
	X float64
	Y float64
}

func (v Vector2) Dot(v2 Vector2) float64 {
	return v.X*v2.X + v.Y*v2.Y
}

func (v Vector2) Scale(f float64) Vector2 {
	return Vector2{v.X * f, v.Y * f}
}

func main() {
	a := Vector2{1.5, 2.5}
	fmt.Println(a.Dot(a))
	b := a.Scale(2)
	fmt.Println(b.X)
}
"#
    )
    .unwrap(), @r###"
    #!/bin/bash

    function Vector2__Dot() {
      local v__X="$1"; shift
      local v__Y="$1"; shift
      local v2__X="$1"; shift
      local v2__Y="$1"; shift
      echo $(echo "$v__X*$v2__X+$v__Y*$v2__Y" | bc -l); return
    }
    function Vector2__Scale() {
      local v__X="$1"; shift
      local v__Y="$1"; shift
      local f="$1"; shift
      _tmp0__X=$(echo "$v__X*$f" | bc -l); _tmp0__Y=$(echo "$v__Y*$f" | bc -l); return
    }
    function main() {
      local a__X=1.5
      local a__Y=2.5
      echo "$(Vector2__Dot "$a__X" "$a__Y" "$a__X" "$a__Y")"
      Vector2__Scale "$a__X" "$a__Y" 2
      local b__X="$_tmp0__X"
      local b__Y="$_tmp0__Y"
      echo "$b__X"
    }
    main "${@}"
    "###);
}

#[test]
fn test_nested_struct_fields() {
    assert_snapshot!(compile(
        r#"
package main

import "fmt"

type Date struct {
	Year  int
	Month int
}

type Person struct {
	Name     string
	Birthday Date
}

func main() {
	var p Person
	p.Name = "ann"
	p.Birthday.Year = 2000
	fmt.Println(p.Name, p.Birthday.Year)
}
"#
    )
    .unwrap(), @r###"
    #!/bin/bash

    function main() {
      local p__Name=""
      local p__Birthday__Year=0
      local p__Birthday__Month=0
      p__Name="ann"
      p__Birthday__Year=2000
      echo "$p__Name" "$p__Birthday__Year"
    }
    main "${@}"
    "###);
}

#[test]
fn test_float_precision_rewrites_renderer() {
    assert_snapshot!(compile(
        r#"
package main

import (
	"fmt"
	"math"

	"github.com/binzume/gotosh/shell"
)

func main() {
	shell.SetFloatPrecision(20)
	fmt.Println("Pi:", math.Atan(1)*4)
}
"#
    )
    .unwrap(), @r###"
    #!/bin/bash

    function main() {
      echo "Pi:" $(echo "scale=20; a(1)*4" | BC_LINE_LENGTH=30 bc -l)
    }
    main "${@}"
    "###);
}

#[test]
fn test_builtin_override() {
    assert_snapshot!(compile(
        r#"
package main

import (
	"fmt"
	"math"
)

func GOTOSH_FUNC_math_Asin(x float64) float64 {
	return math.Atan(x)
}

func main() {
	fmt.Println(math.Asin(1))
}
"#
    )
    .unwrap(), @r###"
    #!/bin/bash

    function GOTOSH_FUNC_math_Asin() {
      local x="$1"; shift
      echo $(echo "a($x)" | bc -l); return
    }
    function main() {
      echo "$(GOTOSH_FUNC_math_Asin 1)"
    }
    main "${@}"
    "###);
}

#[test]
fn test_goroutine_and_defer() {
    assert_snapshot!(compile(
        r#"
package main

import "fmt"

func worker(i int) {
	fmt.Println(i)
}

func main() {
	go worker(1)
	defer fmt.Println("done")
}
"#
    )
    .unwrap(), @r###"
    #!/bin/bash

    function worker() {
      local i="$1"; shift
      echo "$i"
    }
    function main() {
      worker 1 &
      # defer echo "done"
    }
    main "${@}"
    "###);
}

#[test]
fn test_read_loop() {
    assert_snapshot!(compile(
        r#"
package main

import (
	"fmt"

	"github.com/binzume/gotosh/shell"
)

func main() {
	for {
		s, status := shell.Read()
		if status != 0 {
			break
		}
		fmt.Println(s)
	}
}
"#
    )
    .unwrap(), @r###"
    #!/bin/bash

    function main() {
      while true; do :
        IFS= read -r -s _tmp0
        local status="$?"
        local s="$_tmp0"
        if [ $(( status != 0 )) -ne 0 ]; then :
          break
        fi
        echo "$s"
      done
    }
    main "${@}"
    "###);
}

#[test]
fn test_file_descriptor_plumbing() {
    assert_snapshot!(compile(
        r#"
package main

import "os"

func main() {
	w, err := os.Create("t.txt")
	w.WriteString("hi\n")
	w.Close()
	os.Remove("t.txt")
	if err != 0 {
		os.Exit(1)
	}
}
"#
    )
    .unwrap(), @r###"
    #!/bin/bash

    function main() {
      _tmp0=$(( ++GOTOSH_fd + 2 )) ; eval "exec $_tmp0>""t.txt"
      local err="$?"
      local w="$_tmp0"
      echo -n $'hi\n' >&"$w"
      eval "exec "$w"<&- "$w">&-"
      rm -f "t.txt"
      if [ $(( err != 0 )) -ne 0 ]; then :
        exit 1
      fi
    }
    main "${@}"
    "###);
}

#[test]
fn test_if_with_initializer() {
    assert_snapshot!(compile(
        r#"
package main

import "fmt"

func getNum() int {
	return 42
}

func main() {
	if x := getNum(); x > 10 {
		fmt.Println(x)
	}
}
"#
    )
    .unwrap(), @r###"
    #!/bin/bash

    function getNum() {
      echo 42; return
    }
    function main() {
      local x=$(getNum)
      if [ $(( x > 10 )) -ne 0 ]; then :
        echo "$x"
      fi
    }
    main "${@}"
    "###);
}

#[test]
fn test_compound_assign_and_bool() {
    assert_snapshot!(compile(
        r#"
package main

import "fmt"

func main() {
	n := 1
	n += 2
	s := "a"
	s += "b"
	b := true
	for b {
		n++
		b = false
	}
	fmt.Println(n, s, b)
}
"#
    )
    .unwrap(), @r###"
    #!/bin/bash

    function main() {
      local n=1
      let "n += 2"
      local s="a"
      s+="b"
      local b=1
      while [ "$b" -ne 0 ]; do :
        let "n++"
        b=0
      done
      echo "$n" "$s" "$b"
    }
    main "${@}"
    "###);
}

#[test]
fn test_comments_pass_through() {
    assert_snapshot!(compile(
        r#"
package main

import "fmt"

// greeting helper
func main() {
	// say hi
	fmt.Println("hi")
}
"#
    )
    .unwrap(), @r###"
    #!/bin/bash

    # greeting helper
    function main() {
      # say hi
      echo "hi"
    }
    main "${@}"
    "###);
}

#[test]
fn test_unknown_token_comment() {
    let script = compile("package main\n\nfunc main() {\n\t@\n}\n").unwrap();
    assert_snapshot!(script, @r###"
    #!/bin/bash

    function main() {
      # Unknown token <input>:4:2: @ Punct
    }
    main "${@}"
    "###);
}

#[test]
fn test_cross_package_calls() {
    let mut compiler = Compiler::new();
    compiler
        .compile(
            r#"
package util

func Add(x, y int) int {
	return x + y
}
"#,
            "util.go",
        )
        .unwrap();
    compiler
        .compile(
            r#"
package main

import (
	"fmt"

	"example.com/util"
)

func main() {
	fmt.Println(util.Add(1, 2))
}
"#,
            "main.go",
        )
        .unwrap();
    assert_snapshot!(compiler.finish(), @r###"
    #!/bin/bash

    function util__Add() {
      local x="$1"; shift
      local y="$1"; shift
      echo $(( x+y )); return
    }
    function main() {
      echo $(util__Add 1 2)
    }
    main "${@}"
    "###);
}

#[test]
fn test_range_over_args_builtin() {
    assert_snapshot!(compile(
        r#"
package main

import (
	"fmt"

	"github.com/binzume/gotosh/shell"
)

func main() {
	for i, v := range shell.Args() {
		fmt.Println(i, v)
	}
}
"#
    )
    .unwrap(), @r###"
    #!/bin/bash

    function main() {
      local i=0
      for v in "$0" "$@"; do :
        echo "$i" "$v"
      let "i++"; done
    }
    main "${@}"
    "###);
}

#[test]
fn test_user_type_method() {
    assert_snapshot!(compile(
        r#"
package main

import "fmt"

type User string

func (a User) Hello() {
	fmt.Println("I am " + a + ".")
}

func main() {
	var t User = "test"
	t.Hello()
}
"#
    )
    .unwrap(), @r###"
    #!/bin/bash

    function User__Hello() {
      local a="$1"; shift
      echo "I am ""$a""."
    }
    function main() {
      local t="test"
      User__Hello "$t"
    }
    main "${@}"
    "###);
}
