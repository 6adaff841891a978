use crate::mustache::value::{Lambda, Value};
use std::borrow::Cow;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// 渲染作用域。
///
/// 每进入一个区块就以当前作用域为父级压入新的一层；查找失败时沿父级逐层回退。
/// 父级只是借用，作用域链的生命周期不会超过一次渲染调用。
#[derive(Debug)]
pub struct Context<'a> {
    view: Cow<'a, Value>,
    parent: Option<&'a Context<'a>>,
    /// 查找结果缓存，未命中同样以 Null 记录
    cache: RefCell<HashMap<String, Rc<Value>>>,
}

impl<'a> Context<'a> {
    /// 以借用的视图创建根作用域
    pub fn new(view: &'a Value) -> Self {
        Self {
            view: Cow::Borrowed(view),
            parent: None,
            cache: RefCell::new(HashMap::new()),
        }
    }

    pub fn view(&self) -> &Value {
        &self.view
    }

    /// 压入子作用域，父级为 self
    pub fn push(&self, view: Value) -> Context<'_> {
        Context {
            view: Cow::Owned(view),
            parent: Some(self),
            cache: RefCell::new(HashMap::new()),
        }
    }

    /// 以借用的视图压入子作用域，用于遍历数组元素
    pub fn push_borrowed<'b>(&'b self, view: &'b Value) -> Context<'b> {
        Context {
            view: Cow::Borrowed(view),
            parent: Some(self),
            cache: RefCell::new(HashMap::new()),
        }
    }

    /// 按属性链查找值。
    ///
    /// `.` 返回当前视图；`a.b.c` 逐级向下查找，最后一级必须确实存在该属性；
    /// 当前作用域找不到时整条路径交给父级重新查找。结果缓存在发起查找的作用域中。
    /// 查到插值型 lambda 时，以当前视图为接收者调用并返回其结果。
    pub fn lookup(&self, name: &str) -> Rc<Value> {
        let value = if name == "." {
            Rc::new(self.view.as_ref().clone())
        } else {
            let cached = self.cache.borrow().get(name).cloned();
            match cached {
                Some(value) => value,
                None => {
                    let value = Rc::new(self.resolve(name));
                    self.cache.borrow_mut().insert(name.to_string(), Rc::clone(&value));
                    value
                }
            }
        };

        if let Value::Lambda(Lambda::Getter(getter)) = value.as_ref() {
            return Rc::new(getter(self.view.as_ref()));
        }
        value
    }

    fn resolve(&self, name: &str) -> Value {
        let mut context = Some(self);
        while let Some(ctx) = context {
            if let Some(value) = ctx.resolve_local(name) {
                return value;
            }
            context = ctx.parent;
        }
        Value::Null
    }

    /// 只在本层视图中查找
    fn resolve_local(&self, name: &str) -> Option<Value> {
        let view = self.view.as_ref();

        if !name.find('.').is_some_and(|i| i > 0) {
            return view.has_property(name).then(|| view.property(name)).flatten();
        }

        let names: Vec<&str> = name.split('.').collect();
        let (last, parents) = names.split_last()?;
        let mut intermediate = view;
        for segment in parents {
            intermediate = intermediate.child(segment)?;
        }

        let hit = intermediate.has_property(last) || intermediate.primitive_has_property(last);
        hit.then(|| intermediate.property(last)).flatten()
    }
}
