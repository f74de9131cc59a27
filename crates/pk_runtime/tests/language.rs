mod common;

use common::run;

#[test]
fn functions_and_arithmetic() {
    let out = run(r#"
def f(x):
    return x * 2
print(f(21))
print(7 / 2, 7 // 2, 7 % 3, 2 ** 10, -7 // 2)
"#);
    assert_eq!(out, "42\n3.5 3 1 1024 -4\n");
}

#[test]
fn default_and_star_arguments() {
    let out = run(r#"
def g(a, *rest, b=2):
    return (a, b, rest)
def h(a, b=2):
    return a + b
print(g(1))
print(g(1, 5, 6, 7))
print(g(4, b=3))
print(h(1), h(1, 5), h(b=3, a=4))
"#);
    assert_eq!(out, "(1, 2, ())\n(1, 2, (5, 6, 7))\n(4, 3, ())\n3 6 7\n");
}

#[test]
fn loop_else_runs_only_without_break() {
    let out = run(r#"
for i in range(3):
    pass
else:
    print("done")
for i in range(3):
    if i == 1:
        break
else:
    print("never")
print(i)
n = 0
while n < 5:
    n += 1
    if n % 2 == 0:
        continue
    print(n)
else:
    print("while done")
"#);
    assert_eq!(out, "done\n1\n1\n3\n5\nwhile done\n");
}

#[test]
fn chained_comparison_short_circuits() {
    let out = run(r#"
calls = []
def v(x):
    calls.append(x)
    return x
print(1 < 2 < 3, 1 < 3 < 2)
print(v(1) < v(2) < v(0) < v(5))
print(calls)
"#);
    assert_eq!(out, "True False\nFalse\n[1, 2, 0]\n");
}

#[test]
fn closures_and_decorators() {
    let out = run(r#"
def make(n):
    def add(x):
        return x + n
    return add
print(make(3)(4))

def twice(f):
    def g(x):
        return f(f(x))
    return g

@twice
def inc(x):
    return x + 1
print(inc(1))
print((lambda a, b: a * b)(6, 7))
"#);
    assert_eq!(out, "7\n3\n42\n");
}

#[test]
fn global_statement_rebinds_module_names() {
    let out = run(r#"
count = 0
def bump():
    global count
    count += 1
bump()
bump()
print(count)
"#);
    assert_eq!(out, "2\n");
}

#[test]
fn generators_and_yield_from() {
    let out = run(r#"
def gen(n):
    for i in range(n):
        yield i * i

def outer():
    yield "a"
    yield from gen(3)
    yield "b"

print(list(outer()))
g = gen(1)
print(next(g), next(g, "end"))
total = 0
for x in gen(4):
    total += x
print(total)
"#);
    assert_eq!(out, "['a', 0, 1, 4, 'b']\n0 end\n14\n");
}

#[test]
fn classes_inheritance_and_super() {
    let out = run(r#"
class Animal:
    def __init__(self, name):
        self.name = name
    def speak(self):
        return self.name + " makes a sound"

class Dog(Animal):
    def __init__(self, name):
        super().__init__(name)
        self.tricks = []
    def speak(self):
        return super().speak() + " (woof)"

d = Dog("rex")
print(d.speak())
print(isinstance(d, Animal), type(d) is Dog, issubclass(Dog, Animal))
print(d.tricks)
"#);
    assert_eq!(out, "rex makes a sound (woof)\nTrue True True\n[]\n");
}

#[test]
fn magic_methods_drive_operators() {
    let out = run(r#"
class V:
    def __init__(self, x, y):
        self.x = x
        self.y = y
    def __add__(self, o):
        return V(self.x + o.x, self.y + o.y)
    def __eq__(self, o):
        return self.x == o.x and self.y == o.y
    def __repr__(self):
        return f"V({self.x}, {self.y})"

print(V(1, 2) + V(3, 4))
print(V(1, 2) == V(1, 2), V(1, 2) == V(2, 1))
print([V(0, 0)])
"#);
    assert_eq!(out, "V(4, 6)\nTrue False\n[V(0, 0)]\n");
}

#[test]
fn equality_falls_back_to_identity() {
    let out = run(r#"
class A:
    pass
a = A()
print(a == a, a == A(), a != A())
"#);
    assert_eq!(out, "True False True\n");
}

#[test]
fn with_block_enters_and_exits() {
    let out = run(r#"
class Ctx:
    def __enter__(self):
        print("enter")
        return 5
    def __exit__(self):
        print("exit")

with Ctx() as v:
    print(v)
"#);
    assert_eq!(out, "enter\n5\nexit\n");
}

#[test]
fn fstrings_and_format_specs() {
    let out = run(r#"
x = 3.14159
name = "ab"
print(f"{x:.2f}|{name:>5}|{42:05d}|{name:^6}|")
print(f"{1 + 2} and {[1, 2]!r}")
print("{} + {} = {}".format(1, 2, 3))
print("{0}{1}{0}".format("a", "b"), "{name}!".format(name="hi"), "{{}}".format())
"#);
    assert_eq!(out, "3.14|   ab|00042|  ab  |\n3 and [1, 2]\n1 + 2 = 3\naba hi! {}\n");
}

#[test]
fn containers_and_builtins() {
    let out = run(r#"
d = {"b": 2, "a": 1}
d["c"] = 3
print(d)
print(sorted(d), d.get("z", 0), d.items()[0])
print(sorted(["bb", "a", "ccc"], key=len, reverse=True))
print(min(3, 1, 2), max([4, 9, 2]), sum([1, 2, 3]), abs(-5))
print([1, 2, 3, 4][1:3], [1, 2, 3][-1], "hello"[::-1])
print([x * x for x in range(5) if x % 2 == 0])
print({1, 2} | {3}, (1,), len("héllo"))
a, b = 1, 2
a, b = b, a
print(a, b)
print("a,b,c".split(","), "-".join(["x", "y"]), " pad ".strip())
print(list(enumerate("ab")), list(zip([1, 2], "xy")))
print(any([0, 1]), all([1, 0]), int("ff", 16), float("2.5"), str(12))
"#);
    let expected = "\
{'b': 2, 'a': 1, 'c': 3}
['a', 'b', 'c'] 0 ('b', 2)
['ccc', 'bb', 'a']
1 9 6 5
[2, 3] 3 olleh
[0, 4, 16]
{1, 2, 3} (1,) 5
2 1
['a', 'b', 'c'] x-y pad
[(0, 'a'), (1, 'b')] [(1, 'x'), (2, 'y')]
True False 255 2.5 12
";
    assert_eq!(out, expected);
}

#[test]
fn list_methods_mutate_in_place() {
    let out = run(r#"
xs = [3, 1, 2]
xs.append(4)
xs.sort()
xs.insert(0, 0)
print(xs, xs.pop(), xs.index(2), xs.count(1))
xs.reverse()
print(xs)
"#);
    assert_eq!(out, "[0, 1, 2, 3] 4 2 1\n[3, 2, 1, 0]\n");
}

#[test]
fn eval_and_exec_share_the_module() {
    let out = run(r#"
exec("y = 10")
print(eval("y + 1"))
"#);
    assert_eq!(out, "11\n");
}

#[test]
fn properties_staticmethods_and_classmethods_bind_on_load() {
    let out = run(r#"
class Temp:
    scale = 'C'
    def __init__(self, c):
        self._c = c
    @property
    def celsius(self):
        return self._c
    @celsius.setter
    def celsius(self, v):
        self._c = v
    @property
    def kelvin(self):
        return self._c + 273
    @staticmethod
    def describe(x):
        return 'temp ' + str(x)
    @classmethod
    def freezing(cls):
        return cls(0)

class Hot(Temp):
    @classmethod
    def freezing(cls):
        t = super().freezing()
        return (cls.__name__, t.celsius)

t = Temp(20)
t.celsius = 25
print(t.celsius, t.kelvin, t._c)
print(Temp.describe(1), t.describe(2))
f = Temp.freezing()
print(type(f) is Temp, f.celsius, t.freezing().kelvin)
print(Hot.freezing())
print(hasattr(t, 'kelvin'), hasattr(t, 'missing'))
"#);
    assert_eq!(
        out,
        "25 298 25\ntemp 1 temp 2\nTrue 0 273\n('Hot', 0)\nTrue False\n"
    );
}

#[test]
fn assigning_a_read_only_property_fails() {
    let (_, err) = common::run_err(
        "class P:\n    @property\n    def x(self):\n        return 1\nP().x = 2\n",
    );
    let exc = common::exception(&err);
    assert_eq!(exc.type_name, "AttributeError");
    assert_eq!(exc.message, "can't set attribute 'x'");
}
